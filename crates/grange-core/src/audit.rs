//! Append-only audit trail of privileged mutations.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One recorded action. `actor_user_id` is always the real logged-in user,
/// even when the request ran under a masquerade.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
  pub audit_id:      i64,
  pub actor_user_id: i64,
  /// Dotted action name, e.g. `"membership.delete"`.
  pub action:        String,
  pub entity_id:     Option<i64>,
  pub detail:        Option<serde_json::Value>,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::record_audit`].
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub actor_user_id: i64,
  pub action:        String,
  pub entity_id:     Option<i64>,
  pub detail:        Option<serde_json::Value>,
}

impl NewAuditEntry {
  pub fn new(actor_user_id: i64, action: impl Into<String>) -> Self {
    Self {
      actor_user_id,
      action: action.into(),
      entity_id: None,
      detail: None,
    }
  }

  pub fn entity(mut self, entity_id: i64) -> Self {
    self.entity_id = Some(entity_id);
    self
  }

  pub fn detail(mut self, detail: serde_json::Value) -> Self {
    self.detail = Some(detail);
    self
  }
}
