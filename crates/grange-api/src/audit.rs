//! Audit log access.
//!
//! - `GET /audit` — newest first, system admins only
//!
//! Entries always name the real acting user, so a masquerading admin's
//! trail points back at the admin, not the impersonated account.

use axum::{
  Json,
  extract::{Query, State},
};
use grange_core::store::DirectoryStore;
use serde_json::Value;

use crate::{
  AppState, Pagination, auth::CurrentUser, error::ApiError, success,
};

/// `GET /audit`.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Query(page): Query<Pagination>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  if !current.identity.is_system_admin {
    return Err(ApiError::Forbidden(
      "Only system administrators can read the audit log".into(),
    ));
  }
  let entries = state.store.list_audit(page.limit(), page.offset()).await?;
  Ok(success(entries))
}
