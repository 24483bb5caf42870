//! [`MemoryProfileStore`] — a profile map with an optional insertion
//! delay that reproduces the creation-trigger race.

use std::{collections::HashMap, sync::Arc, time::Duration};

use satpam_core::{
  backend::ProfileStore, error::ProfileError, profile::Profile,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryProfileStore {
  profiles: RwLock<HashMap<Uuid, Profile>>,
}

impl MemoryProfileStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn insert_profile(&self, profile: Profile) {
    self.profiles.write().await.insert(profile.id, profile);
  }

  /// Insert `profile` once `delay` has elapsed — the way a row created by
  /// an asynchronous trigger shows up some time after the user exists.
  pub fn insert_profile_after(
    self: &Arc<Self>,
    profile: Profile,
    delay: Duration,
  ) {
    let store = Arc::clone(self);
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      store.insert_profile(profile).await;
    });
  }

  pub async fn remove_profile(&self, id: Uuid) -> Option<Profile> {
    self.profiles.write().await.remove(&id)
  }
}

impl ProfileStore for MemoryProfileStore {
  async fn profile_by_id(&self, id: Uuid) -> Result<Profile, ProfileError> {
    self
      .profiles
      .read()
      .await
      .get(&id)
      .cloned()
      .ok_or(ProfileError::NotFound(id))
  }
}
