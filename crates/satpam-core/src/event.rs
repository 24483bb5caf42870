//! Change notifications emitted by a credential backend.

use crate::session::Session;

/// A session state-change notification.
///
/// The stream carries more kinds than the session authority reacts to;
/// unrecognised kinds must be safe to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
  /// A credential exchange succeeded and a fresh session was issued.
  SignedIn(Session),
  /// The session was terminated, locally or remotely.
  SignedOut,
  /// The token pair was rotated; the principal did not change.
  TokenRefreshed(Session),
  /// The backend updated identity attributes (email change, metadata).
  UserUpdated(Session),
  /// A password-recovery flow started for the signed-in user.
  PasswordRecovery,
}

impl AuthChange {
  /// Short tag for logs. Never includes token material.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::SignedIn(_) => "signed_in",
      Self::SignedOut => "signed_out",
      Self::TokenRefreshed(_) => "token_refreshed",
      Self::UserUpdated(_) => "user_updated",
      Self::PasswordRecovery => "password_recovery",
    }
  }
}
