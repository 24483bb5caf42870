//! HTTP backend for the satpam session authority.
//!
//! Talks to a managed backend-as-a-service: a GoTrue-style auth API for
//! credential exchange and a PostgREST-style record API for profiles.
//! The credential side optionally persists the session to disk and can
//! run a background task that rotates the token pair before expiry.

mod credentials;
mod profiles;
mod wire;

pub use credentials::HttpCredentialBackend;
pub use profiles::HttpProfileStore;

use std::path::PathBuf;

use serde::Deserialize;

/// Connection settings for the managed auth/record service.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// Service root, e.g. `https://project.example.co`. The auth API lives
  /// under `/auth/v1`, the record API under `/rest/v1`.
  pub base_url: String,
  /// Public (anon) API key sent with every request.
  pub anon_key: String,
  /// Where to persist the session across process restarts.
  /// `None` disables persistence.
  #[serde(default)]
  pub session_file: Option<PathBuf>,
}

impl HttpConfig {
  fn auth_url(&self, path: &str) -> String {
    format!("{}/auth/v1{}", self.base_url.trim_end_matches('/'), path)
  }

  fn rest_url(&self, path: &str) -> String {
    format!("{}/rest/v1{}", self.base_url.trim_end_matches('/'), path)
  }
}
