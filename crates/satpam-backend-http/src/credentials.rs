//! [`HttpCredentialBackend`] — credential exchange against a GoTrue-style
//! auth API, with optional on-disk session persistence and background
//! token rotation.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::StatusCode;
use satpam_core::{
  backend::CredentialBackend, error::CredentialError, event::AuthChange,
  session::Session,
};
use tokio::{
  sync::{RwLock, broadcast},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{HttpConfig, wire::TokenResponse};

/// How long before expiry the auto-refresh task rotates the pair.
const REFRESH_MARGIN_SECS: i64 = 60;
/// Poll interval while there is nothing to refresh, and backoff after a
/// transient refresh failure.
const REFRESH_IDLE: Duration = Duration::from_secs(30);

pub struct HttpCredentialBackend {
  pub(crate) client: reqwest::Client,
  config: HttpConfig,
  tokens: RwLock<Option<Session>>,
  events: broadcast::Sender<AuthChange>,
}

fn net(err: reqwest::Error) -> CredentialError {
  CredentialError::Network(Box::new(err))
}

impl HttpCredentialBackend {
  pub fn new(config: HttpConfig) -> Result<Self, CredentialError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| CredentialError::Backend(format!("http client: {e}")))?;
    let (events, _) = broadcast::channel(16);
    Ok(Self {
      client,
      config,
      tokens: RwLock::new(None),
      events,
    })
  }

  /// The bearer token callers need for row-level-secured record reads.
  pub async fn access_token(&self) -> Option<String> {
    self
      .tokens
      .read()
      .await
      .as_ref()
      .map(|s| s.access_token.clone())
  }

  fn emit(&self, change: AuthChange) {
    let _ = self.events.send(change);
  }

  // ── Token exchange ────────────────────────────────────────────────────

  async fn token_exchange(
    &self,
    grant: &str,
    body: serde_json::Value,
  ) -> Result<Session, CredentialError> {
    let response = self
      .client
      .post(self.config.auth_url("/token"))
      .query(&[("grant_type", grant)])
      .header("apikey", &self.config.anon_key)
      .json(&body)
      .send()
      .await
      .map_err(net)?;

    let status = response.status();
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED
    {
      return Err(CredentialError::InvalidCredentials);
    }
    if !status.is_success() {
      return Err(CredentialError::Backend(format!(
        "token endpoint returned {status}"
      )));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
      CredentialError::Backend(format!("malformed token response: {e}"))
    })?;
    Ok(token.into_session(Utc::now()))
  }

  /// Exchange the refresh token for a fresh pair and publish the rotation.
  async fn refresh_session(
    &self,
    refresh_token: &str,
  ) -> Result<Session, CredentialError> {
    let session = self
      .token_exchange(
        "refresh_token",
        serde_json::json!({ "refresh_token": refresh_token }),
      )
      .await?;
    self.remember(&session).await;
    self.emit(AuthChange::TokenRefreshed(session.clone()));
    Ok(session)
  }

  // ── Session persistence ───────────────────────────────────────────────

  async fn remember(&self, session: &Session) {
    *self.tokens.write().await = Some(session.clone());
    self.persist(session).await;
  }

  async fn discard(&self) {
    *self.tokens.write().await = None;
    if let Some(path) = &self.config.session_file {
      let _ = tokio::fs::remove_file(path).await;
    }
  }

  async fn persist(&self, session: &Session) {
    let Some(path) = &self.config.session_file else {
      return;
    };
    match toml::to_string_pretty(session) {
      Ok(raw) => {
        if let Err(e) = tokio::fs::write(path, raw).await {
          warn!(path = %path.display(), error = %e, "could not persist session");
        }
      }
      Err(e) => warn!(error = %e, "could not encode session"),
    }
  }

  async fn load_persisted(&self) -> Option<Session> {
    let path = self.config.session_file.as_ref()?;
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match toml::from_str(&raw) {
      Ok(session) => Some(session),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "unreadable session file; ignoring");
        None
      }
    }
  }

  // ── Auto-refresh ──────────────────────────────────────────────────────

  /// Rotate the token pair shortly before expiry, emitting
  /// [`AuthChange::TokenRefreshed`] on every rotation. Runs until the
  /// returned handle is aborted.
  pub fn start_auto_refresh(self: &Arc<Self>) -> JoinHandle<()> {
    let backend = Arc::clone(self);
    tokio::spawn(async move {
      loop {
        let expires_at = backend
          .tokens
          .read()
          .await
          .as_ref()
          .map(|s| s.expires_at);
        let Some(expires_at) = expires_at else {
          tokio::time::sleep(REFRESH_IDLE).await;
          continue;
        };

        let lead =
          (expires_at - Utc::now()).num_seconds() - REFRESH_MARGIN_SECS;
        if lead > 0 {
          tokio::time::sleep(Duration::from_secs(lead as u64)).await;
        }

        let refresh_token = backend
          .tokens
          .read()
          .await
          .as_ref()
          .map(|s| s.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
          continue;
        };
        match backend.refresh_session(&refresh_token).await {
          Ok(session) => {
            debug!(expires_at = %session.expires_at, "token pair rotated");
          }
          Err(CredentialError::InvalidCredentials) => {
            warn!("refresh token rejected; dropping session");
            backend.discard().await;
            backend.emit(AuthChange::SignedOut);
          }
          Err(e) => {
            warn!(error = %e, "token refresh failed; will retry");
            tokio::time::sleep(REFRESH_IDLE).await;
          }
        }
      }
    })
  }
}

impl CredentialBackend for HttpCredentialBackend {
  async fn current_session(
    &self,
  ) -> Result<Option<Session>, CredentialError> {
    let cached = self.tokens.read().await.clone();
    let session = match cached {
      Some(session) => Some(session),
      None => self.load_persisted().await,
    };
    let Some(session) = session else {
      return Ok(None);
    };

    if !session.is_expired(Utc::now()) {
      // A session restored from disk becomes the live one.
      *self.tokens.write().await = Some(session.clone());
      return Ok(Some(session));
    }

    debug!("persisted session expired; attempting refresh");
    match self.refresh_session(&session.refresh_token).await {
      Ok(fresh) => Ok(Some(fresh)),
      Err(CredentialError::InvalidCredentials) => {
        // The refresh token is dead — a normal anonymous outcome.
        self.discard().await;
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  async fn sign_in_with_password(
    &self,
    email: &str,
    password: &str,
  ) -> Result<Session, CredentialError> {
    let session = self
      .token_exchange(
        "password",
        serde_json::json!({ "email": email, "password": password }),
      )
      .await?;
    self.remember(&session).await;
    info!(user = %session.user.id, "signed in");
    self.emit(AuthChange::SignedIn(session.clone()));
    Ok(session)
  }

  async fn sign_out(&self) -> Result<(), CredentialError> {
    let token = self.access_token().await;
    let result = match token {
      Some(token) => self
        .client
        .post(self.config.auth_url("/logout"))
        .header("apikey", &self.config.anon_key)
        .bearer_auth(token)
        .send()
        .await
        .map(|_| ())
        .map_err(net),
      None => Ok(()),
    };

    // Local disposal is unconditional.
    self.discard().await;
    self.emit(AuthChange::SignedOut);
    result
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
    self.events.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use satpam_core::session::User;
  use uuid::Uuid;

  fn sample_session() -> Session {
    Session {
      access_token:  "header.payload.sig".into(),
      refresh_token: "v2.refresh".into(),
      expires_at:    Utc::now() + chrono::Duration::hours(12),
      user:          User {
        id:    Uuid::new_v4(),
        email: "alice@example.org".into(),
      },
    }
  }

  fn config_with_file(path: std::path::PathBuf) -> HttpConfig {
    HttpConfig {
      base_url:     "http://localhost:9999".into(),
      anon_key:     "anon".into(),
      session_file: Some(path),
    }
  }

  fn scratch_file() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("satpam-session-{}.toml", Uuid::new_v4()))
  }

  #[tokio::test]
  async fn persisted_session_is_restored() {
    let path = scratch_file();
    let session = sample_session();
    tokio::fs::write(&path, toml::to_string_pretty(&session).unwrap())
      .await
      .unwrap();

    let backend =
      HttpCredentialBackend::new(config_with_file(path.clone())).unwrap();
    let current = backend.current_session().await.unwrap();
    assert_eq!(current, Some(session));

    let _ = tokio::fs::remove_file(&path).await;
  }

  #[tokio::test]
  async fn unreadable_session_file_is_anonymous() {
    let path = scratch_file();
    tokio::fs::write(&path, "not a session").await.unwrap();

    let backend =
      HttpCredentialBackend::new(config_with_file(path.clone())).unwrap();
    let current = backend.current_session().await.unwrap();
    assert_eq!(current, None);

    let _ = tokio::fs::remove_file(&path).await;
  }

  #[tokio::test]
  async fn missing_session_file_is_anonymous() {
    let backend =
      HttpCredentialBackend::new(config_with_file(scratch_file())).unwrap();
    assert_eq!(backend.current_session().await.unwrap(), None);
  }
}
