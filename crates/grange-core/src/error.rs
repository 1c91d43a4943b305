//! Error types for `grange-core`.

use thiserror::Error;

/// The domain error taxonomy shared by every storage backend.
///
/// Variants fall into three families: missing rows (`*NotFound`), rule
/// violations (`LastAdmin`, `GroupCycle`, duplicate identifiers), and
/// infrastructure failures (`Storage`, `Serialization`). The API layer
/// maps each family to a status code in one place.
#[derive(Debug, Error)]
pub enum Error {
  #[error("person not found: {0}")]
  PersonNotFound(i64),

  #[error("group not found: {0}")]
  GroupNotFound(i64),

  #[error("membership not found: {0}")]
  MembershipNotFound(i64),

  #[error("contact info not found: {0}")]
  ContactInfoNotFound(i64),

  #[error("session not found: {0}")]
  SessionNotFound(i64),

  #[error("claim not found: {0}")]
  ClaimNotFound(i64),

  #[error("claim {0} has expired")]
  ClaimExpired(i64),

  #[error("claim {0} has already been redeemed")]
  ClaimAlreadyRedeemed(i64),

  #[error("group {0} would be left without an administrator")]
  LastAdmin(i64),

  #[error("person {person_id} is already a member of group {group_id}")]
  AlreadyMember { person_id: i64, group_id: i64 },

  #[error("slug {0:?} is already in use")]
  DuplicateSlug(String),

  #[error("email {0:?} is already registered")]
  DuplicateEmail(String),

  #[error("group {0} cannot be its own ancestor")]
  GroupCycle(i64),

  #[error("group {0} still has subgroups")]
  GroupHasSubgroups(i64),

  #[error("person {0} has no interest vector")]
  NoInterestVector(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
