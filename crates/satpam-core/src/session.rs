//! Session and principal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity record as asserted by the credential backend.
///
/// Immutable from the authority's perspective — replaced wholesale on
/// sign-in, sign-out, and token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:    Uuid,
  pub email: String,
}

/// Opaque, time-bounded proof of authentication issued by the credential
/// backend. The session authority only ever holds a read-only cached copy;
/// the expiry/refresh cycle belongs to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token:  String,
  pub refresh_token: String,
  pub expires_at:    DateTime<Utc>,
  pub user:          User,
}

impl Session {
  /// Whether the access token has passed its expiry instant.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }
}
