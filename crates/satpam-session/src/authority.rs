//! [`SessionAuthority`] — the public, cloneable handle to the actor.

use std::{sync::Arc, time::Duration};

use satpam_core::{
  backend::{CredentialBackend, ProfileStore},
  error::CredentialError,
};
use tokio::sync::{mpsc, watch};

use crate::{actor::Actor, snapshot::AuthSnapshot};

// ─── Timings ─────────────────────────────────────────────────────────────────

/// Fixed delays governing the authority's liveness behaviour.
/// Production uses the defaults; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
  /// Upper bound on the startup load before `loading` is forced to
  /// `false`. A liveness guarantee, not a correctness one.
  pub startup_timeout: Duration,
  /// Wait before the single retry of a not-found profile fetch.
  pub not_found_retry: Duration,
  /// How long a transient error stays visible on the snapshot.
  pub error_clear:     Duration,
}

impl Default for Timings {
  fn default() -> Self {
    Self {
      startup_timeout: Duration::from_secs(10),
      not_found_retry: Duration::from_secs(1),
      error_clear:     Duration::from_secs(5),
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

/// Requests accepted by the actor task.
#[derive(Debug)]
pub(crate) enum Command {
  Initialize,
  RefreshProfile,
  /// Unconditional local credential disposal after a sign-out attempt.
  ClearSession,
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Cloneable handle to the session authority.
///
/// All handles share one actor task, which is the sole writer of the
/// published [`AuthSnapshot`]. The actor stops when every handle has been
/// dropped, which also disposes its backend event subscription.
pub struct SessionAuthority<C> {
  credentials: Arc<C>,
  commands:    mpsc::Sender<Command>,
  snapshot:    watch::Receiver<AuthSnapshot>,
}

impl<C> Clone for SessionAuthority<C> {
  fn clone(&self) -> Self {
    Self {
      credentials: Arc::clone(&self.credentials),
      commands:    self.commands.clone(),
      snapshot:    self.snapshot.clone(),
    }
  }
}

impl<C> SessionAuthority<C>
where
  C: CredentialBackend + 'static,
{
  /// Start the actor task and return a handle to it.
  ///
  /// The actor subscribes to `credentials` change notifications
  /// immediately, but suppresses them until [`initialize`](Self::initialize)
  /// has settled the startup state.
  pub fn spawn<P>(
    credentials: Arc<C>,
    profiles: Arc<P>,
    timings: Timings,
  ) -> Self
  where
    P: ProfileStore + 'static,
  {
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot_rx) = watch::channel(AuthSnapshot::initial());
    let events = credentials.subscribe();

    let actor = Actor::new(
      Arc::clone(&credentials),
      profiles,
      timings,
      snapshot_tx,
      commands_rx,
      events,
    );
    tokio::spawn(actor.run());

    Self {
      credentials,
      commands: commands_tx,
      snapshot: snapshot_rx,
    }
  }

  /// Query the backend for an existing session and settle the initial
  /// state. Idempotent — repeat or concurrent calls are no-ops.
  pub async fn initialize(&self) {
    let _ = self.commands.send(Command::Initialize).await;
  }

  /// Delegate credential verification to the backend.
  ///
  /// Mutates no local state — on success the backend's `SignedIn`
  /// notification drives the update; on failure the error propagates to
  /// the caller and the snapshot is untouched.
  pub async fn sign_in(
    &self,
    email: &str,
    password: &str,
  ) -> Result<(), CredentialError> {
    self
      .credentials
      .sign_in_with_password(email, password)
      .await
      .map(|_session| ())
  }

  /// Sign out.
  ///
  /// Local credentials are disposed of even when the backend call fails;
  /// the failure is still returned for reporting.
  pub async fn sign_out(&self) -> Result<(), CredentialError> {
    let result = self.credentials.sign_out().await;
    let _ = self.commands.send(Command::ClearSession).await;
    result
  }

  /// Explicitly re-fetch the current user's profile, bypassing the
  /// already-loaded shortcut. The only operation that may set `loading`
  /// again after startup, and only for its own duration.
  pub async fn refresh_profile(&self) {
    let _ = self.commands.send(Command::RefreshProfile).await;
  }

  /// The current state tuple.
  pub fn snapshot(&self) -> AuthSnapshot {
    self.snapshot.borrow().clone()
  }

  /// Register an observer. Dropping the receiver unsubscribes.
  pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
    self.snapshot.clone()
  }
}
