//! The collaborator traits consumed by the session authority.
//!
//! Implemented by storage/transport backends (`satpam-backend-http`,
//! `satpam-backend-memory`). The authority depends on these abstractions,
//! not on any concrete backend.

use std::future::Future;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  error::{CredentialError, ProfileError},
  event::AuthChange,
  profile::Profile,
  session::Session,
};

/// Abstraction over the external service that issues and validates
/// sessions.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CredentialBackend: Send + Sync {
  /// Any session the backend already holds for this process — a persisted
  /// token pair, an unexpired in-memory session. `Ok(None)` is the normal
  /// anonymous answer, not an error.
  fn current_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, CredentialError>> + Send + '_;

  /// Verify an email/password pair and issue a fresh session.
  ///
  /// A successful call also emits [`AuthChange::SignedIn`] on the
  /// subscription stream; callers that only need the state update can
  /// discard the returned session.
  fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Session, CredentialError>> + Send + 'a;

  /// Terminate the current session.
  ///
  /// Failure is reportable but ignorable — callers treat local credential
  /// disposal as unconditional.
  fn sign_out(
    &self,
  ) -> impl Future<Output = Result<(), CredentialError>> + Send + '_;

  /// Register for change notifications. Dropping the receiver
  /// unsubscribes.
  fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Abstraction over the record store holding exactly one profile per
/// user id.
pub trait ProfileStore: Send + Sync {
  /// Fetch the profile for `id`. [`ProfileError::NotFound`] is the
  /// expected signal while the creation trigger has not run.
  fn profile_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Profile, ProfileError>> + Send + '_;
}
