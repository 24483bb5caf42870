//! Error taxonomy shared by backends and the session authority.

use thiserror::Error;
use uuid::Uuid;

/// Errors from a [`CredentialBackend`](crate::backend::CredentialBackend).
#[derive(Debug, Error)]
pub enum CredentialError {
  /// The email/password pair was rejected. Propagated to the sign-in
  /// caller directly; never retried.
  #[error("invalid credentials")]
  InvalidCredentials,

  /// The backend could not be reached. Transient.
  #[error("credential backend unreachable: {0}")]
  Network(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The backend answered with something unusable.
  #[error("credential backend error: {0}")]
  Backend(String),
}

/// Errors from a [`ProfileStore`](crate::backend::ProfileStore).
#[derive(Debug, Error)]
pub enum ProfileError {
  /// No record for this user id. Expected while the profile-creation
  /// trigger has not run yet; the authority retries exactly once.
  #[error("no profile record for user {0}")]
  NotFound(Uuid),

  /// The store could not be reached. Transient.
  #[error("profile store unreachable: {0}")]
  Network(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The record exists but could not be decoded.
  #[error("malformed profile record: {0}")]
  Malformed(String),
}
