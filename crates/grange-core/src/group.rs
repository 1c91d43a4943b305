//! Groups, the group hierarchy, and memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A community group. Groups form a forest via `parent_group_id`; the
/// hierarchy is kept cycle-free when groups are re-parented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:          i64,
  pub slug:              String,
  pub name:              String,
  pub parent_group_id:   Option<i64>,
  /// When false, only the group's members and admins (and system admins)
  /// may list its memberships.
  pub members_visible:   bool,
  /// When false, no subgroups may be created under this group.
  pub subgroups_allowed: bool,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub slug:              String,
  pub name:              String,
  pub parent_group_id:   Option<i64>,
  pub members_visible:   bool,
  pub subgroups_allowed: bool,
}

/// Partial update to a group; `None` fields are left untouched.
/// `parent_group_id` distinguishes "leave alone" (`None`) from "make
/// top-level" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
  pub slug:              Option<String>,
  pub name:              Option<String>,
  pub parent_group_id:   Option<Option<i64>>,
  pub members_visible:   Option<bool>,
  pub subgroups_allowed: Option<bool>,
}

/// The join record placing a person in a group, possibly as one of its
/// administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
  pub membership_id: i64,
  pub person_id:     i64,
  pub group_id:      i64,
  pub is_admin:      bool,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::create_membership`].
#[derive(Debug, Clone)]
pub struct NewMembership {
  pub person_id: i64,
  pub group_id:  i64,
  pub is_admin:  bool,
}
