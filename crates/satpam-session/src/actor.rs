//! The single-writer actor behind [`SessionAuthority`](crate::SessionAuthority).
//!
//! All mutation of the published snapshot happens on this task. Overlap
//! between the startup load, backend notifications, and profile fetches is
//! resolved here: at most one profile fetch in flight, the latest queued
//! request wins, stale results are discarded by generation, and events
//! arriving before the startup load has settled are suppressed so the
//! initialization path stays the sole writer during startup.

use std::{sync::Arc, time::Duration};

use satpam_core::{
  backend::{CredentialBackend, ProfileStore},
  error::{CredentialError, ProfileError},
  event::AuthChange,
  profile::Profile,
  session::Session,
};
use tokio::{
  sync::{broadcast, mpsc, watch},
  time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  authority::{Command, Timings},
  snapshot::AuthSnapshot,
};

// ─── Background-task results ─────────────────────────────────────────────────

/// Completion of a background task, delivered back to the actor loop.
enum Arrival {
  SessionCheck(Result<Option<Session>, CredentialError>),
  ProfileFetch {
    generation: u64,
    user_id:    Uuid,
    result:     Result<Profile, ProfileError>,
  },
}

// ─── Fetch guard ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct InflightFetch {
  generation: u64,
  explicit:   bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingFetch {
  user_id:  Uuid,
  explicit: bool,
}

/// Bookkeeping that enforces the single-flight fetch discipline.
#[derive(Debug, Default)]
struct FetchGuard {
  generation: u64,
  inflight:   Option<InflightFetch>,
  /// Only the most recent superseded request is kept.
  queued:     Option<PendingFetch>,
  /// Which user the current `profile` value was loaded for; passive
  /// requests for the same user are skipped.
  loaded_for: Option<Uuid>,
}

// ─── Actor ───────────────────────────────────────────────────────────────────

pub(crate) struct Actor<C, P> {
  credentials: Arc<C>,
  profiles:    Arc<P>,
  timings:     Timings,

  snapshot: watch::Sender<AuthSnapshot>,
  commands: mpsc::Receiver<Command>,
  events:   broadcast::Receiver<AuthChange>,

  arrivals_tx: mpsc::Sender<Arrival>,
  arrivals_rx: mpsc::Receiver<Arrival>,

  state: AuthSnapshot,
  fetch: FetchGuard,

  /// Set when `Initialize` is first accepted; later ones are no-ops.
  init_requested: bool,
  /// Set once the session-check outcome (or the safety timeout) has been
  /// applied; backend events are suppressed until then.
  init_applied:   bool,
  /// Set when `loading` has made its one startup `true → false`
  /// transition; background work never raises it again.
  startup_done:   bool,
  events_closed:  bool,

  startup_deadline: Option<Instant>,
  error_deadline:   Option<Instant>,
}

impl<C, P> Actor<C, P>
where
  C: CredentialBackend + 'static,
  P: ProfileStore + 'static,
{
  pub(crate) fn new(
    credentials: Arc<C>,
    profiles: Arc<P>,
    timings: Timings,
    snapshot: watch::Sender<AuthSnapshot>,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Receiver<AuthChange>,
  ) -> Self {
    let (arrivals_tx, arrivals_rx) = mpsc::channel(16);
    Self {
      credentials,
      profiles,
      timings,
      snapshot,
      commands,
      events,
      arrivals_tx,
      arrivals_rx,
      state: AuthSnapshot::initial(),
      fetch: FetchGuard::default(),
      init_requested: false,
      init_applied: false,
      startup_done: false,
      events_closed: false,
      startup_deadline: None,
      error_deadline: None,
    }
  }

  pub(crate) async fn run(mut self) {
    loop {
      tokio::select! {
        cmd = self.commands.recv() => match cmd {
          Some(cmd) => self.on_command(cmd),
          // Every handle is gone; stop writing.
          None => break,
        },

        event = self.events.recv(), if !self.events_closed => match event {
          Ok(event) => self.on_event(event),
          Err(broadcast::error::RecvError::Lagged(missed)) => {
            warn!(missed, "session notifications lagged");
          }
          Err(broadcast::error::RecvError::Closed) => {
            debug!("notification stream closed; snapshot stays serveable");
            self.events_closed = true;
          }
        },

        Some(arrival) = self.arrivals_rx.recv() => self.on_arrival(arrival),

        _ = sleep_opt(self.startup_deadline),
          if self.startup_deadline.is_some() => self.on_startup_timeout(),

        _ = sleep_opt(self.error_deadline),
          if self.error_deadline.is_some() => self.on_error_clear(),
      }
    }
  }

  // ── Commands ──────────────────────────────────────────────────────────

  fn on_command(&mut self, cmd: Command) {
    match cmd {
      Command::Initialize => self.start_initialize(),
      Command::RefreshProfile => self.on_refresh_profile(),
      Command::ClearSession => {
        info!("local sign-out");
        self.clear_session();
      }
    }
  }

  fn start_initialize(&mut self) {
    if self.init_requested {
      debug!("initialize requested again; ignoring");
      return;
    }
    self.init_requested = true;
    self.startup_deadline =
      Some(Instant::now() + self.timings.startup_timeout);

    let credentials = Arc::clone(&self.credentials);
    let arrivals = self.arrivals_tx.clone();
    tokio::spawn(async move {
      let result = credentials.current_session().await;
      let _ = arrivals.send(Arrival::SessionCheck(result)).await;
    });
  }

  fn on_refresh_profile(&mut self) {
    let Some(user) = &self.state.user else {
      debug!("profile refresh requested while signed out; ignoring");
      return;
    };
    let user_id = user.id;
    self.request_profile(user_id, true);
    self.publish();
  }

  // ── Backend notifications ─────────────────────────────────────────────

  fn on_event(&mut self, event: AuthChange) {
    if !self.init_applied {
      // The startup load is the sole authority until it settles.
      debug!(kind = event.kind(), "notification before startup settled; suppressed");
      return;
    }
    match event {
      AuthChange::SignedIn(session) => {
        info!(user = %session.user.id, "signed in");
        let user_id = session.user.id;
        self.state.user = Some(session.user.clone());
        self.state.session = Some(session);
        self.request_profile(user_id, false);
        self.publish();
      }
      AuthChange::TokenRefreshed(session) => {
        // The profile is deliberately untouched: a token rotation must
        // not bounce the UI through a logged-out state.
        debug!(user = %session.user.id, "token refreshed");
        self.state.user = Some(session.user.clone());
        self.state.session = Some(session);
        self.publish();
      }
      AuthChange::SignedOut => {
        info!("signed out");
        self.clear_session();
      }
      other => {
        debug!(kind = other.kind(), "ignoring notification");
      }
    }
  }

  // ── Background-task results ───────────────────────────────────────────

  fn on_arrival(&mut self, arrival: Arrival) {
    match arrival {
      Arrival::SessionCheck(result) => self.on_session_check(result),
      Arrival::ProfileFetch { generation, user_id, result } => {
        self.on_profile_fetch(generation, user_id, result);
      }
    }
  }

  fn on_session_check(
    &mut self,
    result: Result<Option<Session>, CredentialError>,
  ) {
    if self.init_applied {
      // The safety timeout already settled startup; applying a stale
      // session now could overwrite a newer notification.
      debug!("session check arrived after startup settled; ignoring");
      return;
    }
    self.init_applied = true;

    match result {
      Ok(Some(session)) => {
        info!(user = %session.user.id, "existing session restored");
        let user_id = session.user.id;
        self.state.user = Some(session.user.clone());
        self.state.session = Some(session);
        // `loading` stays up until the profile fetch settles (or the
        // safety timeout fires).
        self.request_profile(user_id, false);
      }
      Ok(None) => {
        debug!("no existing session; anonymous");
        self.settle_startup();
      }
      Err(err) => {
        warn!(error = %err, "session check failed; starting anonymous");
        self.set_error(err.to_string());
        self.settle_startup();
      }
    }
    self.publish();
  }

  fn on_profile_fetch(
    &mut self,
    generation: u64,
    user_id: Uuid,
    result: Result<Profile, ProfileError>,
  ) {
    let Some(inflight) = self.fetch.inflight else {
      debug!(%user_id, "profile fetch result after reset; discarding");
      return;
    };
    if inflight.generation != generation {
      debug!(%user_id, "stale profile fetch result; discarding");
      return;
    }
    self.fetch.inflight = None;

    match result {
      Ok(profile) => {
        debug!(%user_id, role = %profile.role, "profile loaded");
        self.fetch.loaded_for = Some(user_id);
        self.state.profile = Some(profile);
        self.clear_error();
      }
      Err(ProfileError::NotFound(_)) => {
        // Both attempts exhausted. Non-fatal: surface it, keep whatever
        // profile we already had.
        warn!(%user_id, "profile still missing after retry");
        self.set_error("profile record not found");
      }
      Err(err) => {
        // Transient failure — the previous profile stays so a network
        // blip does not log the user out.
        warn!(%user_id, error = %err, "profile fetch failed; keeping previous profile");
        self.set_error(err.to_string());
      }
    }

    if !self.startup_done {
      self.settle_startup();
    } else if inflight.explicit {
      // End of the one window where a refresh may hold `loading` up.
      self.state.loading = false;
    }

    // Replay the most recent superseded request, if any.
    if let Some(pending) = self.fetch.queued.take() {
      if pending.explicit {
        self.state.loading = true;
      }
      self.spawn_fetch(pending.user_id, pending.explicit);
    }
    self.publish();
  }

  // ── Profile fetch discipline ──────────────────────────────────────────

  fn request_profile(&mut self, user_id: Uuid, explicit: bool) {
    if !explicit
      && self.fetch.loaded_for == Some(user_id)
      && self.state.profile.is_some()
    {
      debug!(%user_id, "profile already loaded; skipping fetch");
      return;
    }
    if explicit {
      self.state.loading = true;
    }
    if self.fetch.inflight.is_some() {
      debug!(%user_id, "profile fetch in flight; queueing");
      self.fetch.queued = Some(PendingFetch { user_id, explicit });
      return;
    }
    self.spawn_fetch(user_id, explicit);
  }

  fn spawn_fetch(&mut self, user_id: Uuid, explicit: bool) {
    self.fetch.generation += 1;
    let generation = self.fetch.generation;
    self.fetch.inflight = Some(InflightFetch { generation, explicit });

    let profiles = Arc::clone(&self.profiles);
    let arrivals = self.arrivals_tx.clone();
    let retry_after = self.timings.not_found_retry;
    tokio::spawn(async move {
      let result =
        fetch_with_retry(profiles.as_ref(), user_id, retry_after).await;
      let _ = arrivals
        .send(Arrival::ProfileFetch { generation, user_id, result })
        .await;
    });
  }

  // ── State helpers ─────────────────────────────────────────────────────

  /// Drop all credentials and reset the fetch guard. Any in-flight fetch
  /// result becomes stale and will be discarded on arrival.
  fn clear_session(&mut self) {
    self.state.session = None;
    self.state.user = None;
    self.state.profile = None;
    self.clear_error();
    self.fetch.inflight = None;
    self.fetch.queued = None;
    self.fetch.loaded_for = None;
    if self.startup_done {
      self.state.loading = false;
    }
    self.publish();
  }

  /// The one startup `loading: true → false` transition.
  fn settle_startup(&mut self) {
    self.startup_done = true;
    self.startup_deadline = None;
    self.state.loading = false;
  }

  fn on_startup_timeout(&mut self) {
    self.startup_deadline = None;
    if self.startup_done {
      return;
    }
    warn!(
      timeout = ?self.timings.startup_timeout,
      "startup load did not settle in time; forcing ready"
    );
    self.init_applied = true;
    self.settle_startup();
    self.publish();
  }

  fn set_error(&mut self, message: impl Into<String>) {
    self.state.error = Some(message.into());
    self.error_deadline = Some(Instant::now() + self.timings.error_clear);
  }

  fn clear_error(&mut self) {
    self.state.error = None;
    self.error_deadline = None;
  }

  fn on_error_clear(&mut self) {
    self.error_deadline = None;
    if self.state.error.take().is_some() {
      self.publish();
    }
  }

  fn publish(&self) {
    self.snapshot.send_replace(self.state.clone());
  }
}

// ─── Free helpers ────────────────────────────────────────────────────────────

/// Fetch a profile, retrying a not-found answer exactly once after
/// `retry_after` — the expected wait for the profile-creation trigger.
async fn fetch_with_retry<P: ProfileStore>(
  profiles: &P,
  user_id: Uuid,
  retry_after: Duration,
) -> Result<Profile, ProfileError> {
  match profiles.profile_by_id(user_id).await {
    Err(ProfileError::NotFound(_)) => {
      debug!(%user_id, "profile not found; retrying once");
      tokio::time::sleep(retry_after).await;
      profiles.profile_by_id(user_id).await
    }
    other => other,
  }
}

/// Sleep until `deadline`; pending forever when there is none.
async fn sleep_opt(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => sleep_until(deadline).await,
    None => std::future::pending().await,
  }
}
