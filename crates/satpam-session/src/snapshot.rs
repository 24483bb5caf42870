//! The published auth state tuple and its permission predicates.

use satpam_core::{
  profile::{Profile, Role},
  session::{Session, User},
};
use uuid::Uuid;

/// One consistent view of the authenticated-session state.
///
/// Single writer (the authority actor), any number of readers. Cheap to
/// clone; every mutation is published as a whole new value.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
  pub session: Option<Session>,
  pub user:    Option<User>,
  pub profile: Option<Profile>,
  /// `true` from construction until the startup load settles, and
  /// afterwards only for the duration of an explicit profile refresh.
  pub loading: bool,
  /// Transient, human-readable failure notice. Cleared automatically.
  pub error:   Option<String>,
}

impl AuthSnapshot {
  /// The pre-initialize state: nothing known, load pending.
  pub(crate) fn initial() -> Self {
    Self {
      session: None,
      user:    None,
      profile: None,
      loading: true,
      error:   None,
    }
  }

  /// The loaded role, if a profile is present.
  pub fn role(&self) -> Option<Role> {
    self.profile.as_ref().map(|p| p.role)
  }

  pub fn is_authenticated(&self) -> bool {
    self.user.is_some()
  }

  // ── Permission predicates ─────────────────────────────────────────────
  //
  // Pure functions of the current profile/user; all of them answer
  // `false` while the relevant field is absent.

  /// `true` iff a profile is loaded and its role is in `roles`.
  pub fn has_permission(&self, roles: &[Role]) -> bool {
    match self.role() {
      Some(role) => roles.contains(&role),
      None => false,
    }
  }

  /// User-account administration. Reserved to `super_admin`.
  pub fn can_manage_users(&self) -> bool {
    self.has_permission(&[Role::SuperAdmin])
  }

  /// Membership rolls.
  pub fn can_manage_members(&self) -> bool {
    self.has_permission(&[Role::SuperAdmin, Role::Admin])
  }

  /// Leadership records.
  pub fn can_manage_leadership(&self) -> bool {
    self.has_permission(&[Role::SuperAdmin, Role::Admin])
  }

  /// Publishing (as opposed to drafting) articles.
  pub fn can_publish_articles(&self) -> bool {
    self.has_permission(&[Role::SuperAdmin, Role::Admin])
  }

  /// Ownership check: any signed-in user may edit what they authored.
  pub fn can_edit_own_content(&self, author_id: Uuid) -> bool {
    self.user.as_ref().is_some_and(|u| u.id == author_id)
  }
}
