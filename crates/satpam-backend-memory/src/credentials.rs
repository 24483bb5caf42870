//! [`MemoryCredentialBackend`] — argon2-verified sign-in over an in-memory
//! user registry, issuing TTL-bounded sessions.

use std::collections::HashMap;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore as _};
use satpam_core::{
  backend::CredentialBackend,
  error::CredentialError,
  event::AuthChange,
  session::{Session, User},
};
use tokio::sync::{RwLock, broadcast};
use tracing::info;
use uuid::Uuid;

struct UserRecord {
  id:            Uuid,
  email:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  password_hash: String,
}

/// An in-process credential backend. One session at a time — this models
/// the per-process session slot the authority consumes, not a multi-user
/// server.
pub struct MemoryCredentialBackend {
  /// Keyed by lowercased email.
  users:   RwLock<HashMap<String, UserRecord>>,
  session: RwLock<Option<Session>>,
  ttl:     Duration,
  events:  broadcast::Sender<AuthChange>,
}

/// 128-bit random token, base64url without padding.
fn random_token() -> String {
  let mut buf = [0u8; 32];
  OsRng.fill_bytes(&mut buf);
  B64.encode(buf)
}

impl MemoryCredentialBackend {
  pub fn new() -> Self {
    Self::with_ttl(Duration::hours(1))
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    let (events, _) = broadcast::channel(16);
    Self {
      users: RwLock::new(HashMap::new()),
      session: RwLock::new(None),
      ttl,
      events,
    }
  }

  /// Register a user and return their generated id.
  pub async fn add_user(
    &self,
    email: &str,
    password: &str,
  ) -> Result<Uuid, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| CredentialError::Backend(format!("password hash: {e}")))?
      .to_string();

    let id = Uuid::new_v4();
    let record = UserRecord {
      id,
      email: email.to_string(),
      password_hash,
    };
    self
      .users
      .write()
      .await
      .insert(email.to_lowercase(), record);
    Ok(id)
  }

  fn issue(&self, id: Uuid, email: String) -> Session {
    let now = Utc::now();
    Session {
      access_token:  random_token(),
      refresh_token: random_token(),
      expires_at:    now + self.ttl,
      user:          User { id, email },
    }
  }

  fn emit(&self, change: AuthChange) {
    // No receivers is fine; the send result only reports that.
    let _ = self.events.send(change);
  }
}

impl Default for MemoryCredentialBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl CredentialBackend for MemoryCredentialBackend {
  async fn current_session(
    &self,
  ) -> Result<Option<Session>, CredentialError> {
    let mut slot = self.session.write().await;
    if slot.as_ref().is_some_and(|s| s.is_expired(Utc::now())) {
      *slot = None;
    }
    Ok(slot.clone())
  }

  async fn sign_in_with_password(
    &self,
    email: &str,
    password: &str,
  ) -> Result<Session, CredentialError> {
    let users = self.users.read().await;
    // Unknown user and wrong password answer identically.
    let Some(record) = users.get(&email.to_lowercase()) else {
      return Err(CredentialError::InvalidCredentials);
    };
    let parsed = PasswordHash::new(&record.password_hash)
      .map_err(|e| CredentialError::Backend(format!("stored hash: {e}")))?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .map_err(|_| CredentialError::InvalidCredentials)?;

    let session = self.issue(record.id, record.email.clone());
    drop(users);

    *self.session.write().await = Some(session.clone());
    info!(user = %session.user.id, "session issued");
    self.emit(AuthChange::SignedIn(session.clone()));
    Ok(session)
  }

  async fn sign_out(&self) -> Result<(), CredentialError> {
    let revoked = self.session.write().await.take();
    if let Some(session) = revoked {
      info!(user = %session.user.id, "session revoked");
    }
    self.emit(AuthChange::SignedOut);
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
    self.events.subscribe()
  }
}
