//! Users, sessions, claims, and the resolved acting identity.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An account that can log in. A user may own any number of person records:
/// their own profile plus any dependents they manage.
#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub user_id:         i64,
  pub email:           String,
  /// Argon2 PHC string. Never serialized.
  #[serde(skip_serializing)]
  pub password_hash:   String,
  pub is_system_admin: bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:           String,
  pub password_hash:   String,
  pub is_system_admin: bool,
}

/// A bearer-token login session. Only the SHA-256 hash of the token is
/// stored; the token itself is handed to the client once and forgotten.
#[derive(Debug, Clone)]
pub struct Session {
  pub session_id:         i64,
  pub user_id:            i64,
  pub token_hash:         String,
  pub created_at:         DateTime<Utc>,
  pub expires_at:         DateTime<Utc>,
  /// When set, requests on this session act as this user instead. Only
  /// sessions owned by system administrators may carry a masquerade.
  pub masquerade_user_id: Option<i64>,
}

/// A single-use invitation that lets a user take ownership of an unclaimed
/// person record.
#[derive(Debug, Clone, Serialize)]
pub struct Claim {
  pub claim_id:            i64,
  pub person_id:           i64,
  #[serde(skip_serializing)]
  pub token_hash:          String,
  pub created_by_user_id:  i64,
  pub created_at:          DateTime<Utc>,
  pub expires_at:          DateTime<Utc>,
  pub redeemed_at:         Option<DateTime<Utc>>,
  pub redeemed_by_user_id: Option<i64>,
}

/// The actor behind one request, resolved once by the authentication layer:
/// the effective user (after any masquerade), their system-admin bit, and
/// the ids of every person record they own.
#[derive(Debug, Clone)]
pub struct ActingIdentity {
  pub user_id:          i64,
  pub is_system_admin:  bool,
  pub owned_person_ids: Vec<i64>,
}

impl ActingIdentity {
  /// Does this identity own the given person record?
  pub fn owns(&self, person_id: i64) -> bool {
    self.owned_person_ids.contains(&person_id)
  }
}
