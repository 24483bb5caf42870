//! Profile and role types.
//!
//! A profile is the domain record keyed by user id. It is created exactly
//! once, by a trigger in the profile store, which may lag behind user
//! creation — the authority's not-found retry exists for that window.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of roles. Declaration order gives the total order of
/// permission scope: `Kontributor < Admin < SuperAdmin`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Kontributor,
  Admin,
  SuperAdmin,
}

impl Role {
  /// The discriminant string used in records and logs.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Kontributor => "kontributor",
      Self::Admin => "admin",
      Self::SuperAdmin => "super_admin",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Domain record for one user. Mutated only by administrative tooling or
/// the creation trigger; the session authority reads it and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  /// Equal to the [`User`](crate::session::User) id it belongs to.
  pub id:         Uuid,
  pub email:      String,
  pub full_name:  String,
  pub role:       Role,
  pub avatar_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
