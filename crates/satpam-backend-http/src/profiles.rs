//! [`HttpProfileStore`] — profile reads against a PostgREST-style record
//! API.

use std::sync::Arc;

use satpam_core::{
  backend::ProfileStore, error::ProfileError, profile::Profile,
};
use uuid::Uuid;

use crate::{HttpConfig, HttpCredentialBackend};

pub struct HttpProfileStore {
  client:      reqwest::Client,
  config:      HttpConfig,
  /// Row-level security needs the signed-in user's bearer token, so the
  /// store reads it from the credential backend on every call.
  credentials: Arc<HttpCredentialBackend>,
}

impl HttpProfileStore {
  pub fn new(
    config: HttpConfig,
    credentials: Arc<HttpCredentialBackend>,
  ) -> Self {
    // Shares the credential backend's connection pool.
    let client = credentials.client.clone();
    Self { client, config, credentials }
  }
}

impl ProfileStore for HttpProfileStore {
  async fn profile_by_id(&self, id: Uuid) -> Result<Profile, ProfileError> {
    let mut request = self
      .client
      .get(self.config.rest_url("/profiles"))
      .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())])
      .header("apikey", &self.config.anon_key);
    if let Some(token) = self.credentials.access_token().await {
      request = request.bearer_auth(token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| ProfileError::Network(Box::new(e)))?;

    let status = response.status();
    if !status.is_success() {
      return Err(ProfileError::Network(
        format!("profile endpoint returned {status}").into(),
      ));
    }

    let rows: Vec<Profile> = response
      .json()
      .await
      .map_err(|e| ProfileError::Malformed(e.to_string()))?;
    rows.into_iter().next().ok_or(ProfileError::NotFound(id))
  }
}
