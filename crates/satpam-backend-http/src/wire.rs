//! Wire formats for the auth endpoint responses.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use satpam_core::session::{Session, User};

/// Body of a successful `POST /token` exchange, for both the password and
/// the refresh-token grants.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
  pub access_token:  String,
  pub refresh_token: String,
  /// Seconds until `access_token` expires.
  pub expires_in:    i64,
  pub user:          WireUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
  pub id:    Uuid,
  /// Absent for phone-only accounts; this deployment always has one.
  pub email: Option<String>,
}

impl TokenResponse {
  /// Stamp the relative expiry into an absolute instant.
  pub(crate) fn into_session(self, now: DateTime<Utc>) -> Session {
    Session {
      access_token:  self.access_token,
      refresh_token: self.refresh_token,
      expires_at:    now + chrono::Duration::seconds(self.expires_in),
      user:          User {
        id:    self.user.id,
        email: self.user.email.unwrap_or_default(),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone as _;

  #[test]
  fn token_response_maps_to_session() {
    let raw = r#"{
      "access_token": "header.payload.sig",
      "token_type": "bearer",
      "expires_in": 3600,
      "refresh_token": "v2.refresh",
      "user": {
        "id": "4b1adbd1-3d07-4a09-9b0b-6a6a7e4d3f1a",
        "aud": "authenticated",
        "email": "alice@example.org"
      }
    }"#;
    let parsed: TokenResponse = serde_json::from_str(raw).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let session = parsed.into_session(now);

    assert_eq!(session.access_token, "header.payload.sig");
    assert_eq!(session.refresh_token, "v2.refresh");
    assert_eq!(
      session.expires_at,
      Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()
    );
    assert_eq!(session.user.email, "alice@example.org");
  }

  #[test]
  fn missing_email_becomes_empty() {
    let raw = r#"{
      "access_token": "a",
      "expires_in": 60,
      "refresh_token": "r",
      "user": { "id": "4b1adbd1-3d07-4a09-9b0b-6a6a7e4d3f1a" }
    }"#;
    let parsed: TokenResponse = serde_json::from_str(raw).unwrap();
    let session = parsed.into_session(Utc::now());
    assert_eq!(session.user.email, "");
  }
}
