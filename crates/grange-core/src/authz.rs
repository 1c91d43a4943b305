//! Membership authorization predicates and the last-admin guard.
//!
//! These are pure functions: callers supply the relevant slice of state
//! (admin person ids, row counts) and interpret the verdict. The SQLite
//! store re-runs the guard inside its mutation transactions so the
//! decision and the write cannot be separated by a concurrent writer.

use crate::{
  error::{Error, Result},
  identity::ActingIdentity,
};

/// May `identity` create, update, or delete memberships of a group whose
/// admin memberships currently belong to `group_admin_person_ids`?
///
/// System administrators always may. Anyone else must own at least one
/// person that currently holds an admin membership in the group.
pub fn can_modify_group_memberships(
  identity: &ActingIdentity,
  group_admin_person_ids: &[i64],
) -> bool {
  if identity.is_system_admin {
    return true;
  }
  identity
    .owned_person_ids
    .iter()
    .any(|id| group_admin_person_ids.contains(id))
}

/// May `identity` move the admin flag of a membership held by
/// `target_person_id` from `current` to `requested`?
///
/// Writing the current value back is not a change and is always allowed.
/// An actual change is allowed for system administrators and for targets
/// the identity does not own: group admins may promote and demote others,
/// never themselves.
pub fn can_change_admin_flag(
  identity: &ActingIdentity,
  target_person_id: i64,
  current: bool,
  requested: bool,
) -> bool {
  if requested == current {
    return true;
  }
  if identity.is_system_admin {
    return true;
  }
  !identity.owns(target_person_id)
}

/// Guard for demoting an admin membership (`is_admin` true -> false).
///
/// The membership survives the demotion, so the group keeps its members;
/// at least one other admin must remain. Call only when the target
/// membership currently carries the admin flag.
pub fn assert_admin_demotion_allowed(group_id: i64, admin_count: i64) -> Result<()> {
  if admin_count <= 1 {
    return Err(Error::LastAdmin(group_id));
  }
  Ok(())
}

/// Guard for removing an admin membership entirely.
///
/// Removal is allowed either when another admin remains or when the
/// membership is the group's only one: a group emptied of members has
/// nobody left to administer. Call only when the target membership
/// currently carries the admin flag.
pub fn assert_admin_removal_allowed(
  group_id: i64,
  admin_count: i64,
  member_count: i64,
) -> Result<()> {
  if admin_count <= 1 && member_count > 1 {
    return Err(Error::LastAdmin(group_id));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity(is_system_admin: bool, owned: &[i64]) -> ActingIdentity {
    ActingIdentity {
      user_id: 1,
      is_system_admin,
      owned_person_ids: owned.to_vec(),
    }
  }

  #[test]
  fn system_admin_may_always_modify_memberships() {
    assert!(can_modify_group_memberships(&identity(true, &[]), &[]));
  }

  #[test]
  fn group_admin_may_modify_memberships() {
    assert!(can_modify_group_memberships(
      &identity(false, &[7, 9]),
      &[9, 12]
    ));
  }

  #[test]
  fn plain_member_may_not_modify_memberships() {
    assert!(!can_modify_group_memberships(&identity(false, &[7]), &[9, 12]));
  }

  #[test]
  fn adminless_group_rejects_everyone_but_system_admins() {
    assert!(!can_modify_group_memberships(&identity(false, &[7]), &[]));
  }

  #[test]
  fn writing_the_same_admin_flag_back_is_not_a_change() {
    let id = identity(false, &[7]);
    assert!(can_change_admin_flag(&id, 7, true, true));
    assert!(can_change_admin_flag(&id, 7, false, false));
  }

  #[test]
  fn changing_the_flag_on_an_owned_person_is_forbidden() {
    let id = identity(false, &[7]);
    assert!(!can_change_admin_flag(&id, 7, false, true));
    assert!(!can_change_admin_flag(&id, 7, true, false));
  }

  #[test]
  fn changing_the_flag_on_someone_else_is_allowed() {
    let id = identity(false, &[7]);
    assert!(can_change_admin_flag(&id, 8, false, true));
    assert!(can_change_admin_flag(&id, 8, true, false));
  }

  #[test]
  fn system_admin_may_change_their_own_flag() {
    let id = identity(true, &[7]);
    assert!(can_change_admin_flag(&id, 7, true, false));
  }

  #[test]
  fn demoting_the_last_admin_is_rejected() {
    assert!(matches!(
      assert_admin_demotion_allowed(1, 1),
      Err(Error::LastAdmin(1))
    ));
  }

  #[test]
  fn demotion_passes_with_a_second_admin() {
    assert!(assert_admin_demotion_allowed(1, 2).is_ok());
  }

  #[test]
  fn removing_the_last_admin_of_a_populated_group_is_rejected() {
    assert!(matches!(
      assert_admin_removal_allowed(1, 1, 3),
      Err(Error::LastAdmin(1))
    ));
  }

  #[test]
  fn removing_a_sole_admin_who_is_the_sole_member_passes() {
    assert!(assert_admin_removal_allowed(1, 1, 1).is_ok());
  }

  #[test]
  fn removal_passes_with_a_second_admin() {
    assert!(assert_admin_removal_allowed(1, 2, 5).is_ok());
  }
}
