//! JSON API for the Grange community directory.
//!
//! Every handler is generic over a [`DirectoryStore`] implementation and
//! answers with a uniform envelope: `{"success": true, "data": …}` on
//! success, `{"success": false, "message": …}` on failure. Authentication
//! is a bearer token in the `Authorization` header; only registration and
//! login are open. Mutations check existence (404) before authorization
//! (403) before invariants (400), so clients can rely on the reported
//! status.

pub mod audit;
pub mod auth;
pub mod claims;
pub mod error;
pub mod groups;
pub mod memberships;
pub mod people;


use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{delete, get, post, put},
};
use grange_core::{audit::NewAuditEntry, store::DirectoryStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use crate::{auth::CurrentUser, error::ApiError};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

/// How long a login session stays usable.
pub const SESSION_TTL_DAYS: i64 = 30;

/// How long an unredeemed claim token stays usable.
pub const CLAIM_TTL_DAYS: i64 = 14;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: DirectoryStore> {
  pub store: Arc<S>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API [`Router`] around `state`.
pub fn api_router<S>(state: AppState<S>) -> Router
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .route("/auth/logout", post(auth::logout::<S>))
    .route("/auth/me", get(auth::me::<S>))
    .route(
      "/auth/masquerade",
      post(auth::start_masquerade::<S>).delete(auth::stop_masquerade::<S>),
    )
    .route("/people", get(people::list::<S>).post(people::create::<S>))
    .route(
      "/people/{id}",
      get(people::get_one::<S>)
        .patch(people::update::<S>)
        .delete(people::remove::<S>),
    )
    .route("/people/{id}/memberships", get(people::memberships::<S>))
    .route(
      "/people/{id}/contact-info",
      get(people::list_contact_info::<S>).post(people::add_contact_info::<S>),
    )
    .route(
      "/contact-info/{id}",
      delete(people::remove_contact_info::<S>),
    )
    .route(
      "/people/{id}/interests",
      get(people::get_interests::<S>).put(people::set_interests::<S>),
    )
    .route("/people/{id}/similar", get(people::similar::<S>))
    .route(
      "/people/{id}/claims",
      get(claims::list_for_person::<S>).post(claims::issue::<S>),
    )
    .route("/claims/redeem", post(claims::redeem::<S>))
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route(
      "/groups/{id}",
      get(groups::get_one::<S>)
        .patch(groups::update::<S>)
        .delete(groups::remove::<S>),
    )
    .route("/groups/{id}/memberships", get(groups::memberships::<S>))
    .route("/memberships", post(memberships::create::<S>))
    .route(
      "/memberships/{id}",
      put(memberships::replace::<S>)
        .patch(memberships::update::<S>)
        .delete(memberships::remove::<S>),
    )
    .route("/audit", get(audit::list::<S>))
    .with_state(state)
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// `{"success": true, "data": …}`
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
  Json(json!({ "success": true, "data": data }))
}

/// `{"success": true}` — for operations with nothing to return.
pub(crate) fn no_data() -> Json<Value> {
  Json(json!({ "success": true }))
}

/// Records an audit entry; a failed write is logged, never surfaced.
pub(crate) async fn record_audit<S: DirectoryStore>(
  store: &S,
  entry: NewAuditEntry,
) {
  let action = entry.action.clone();
  if let Err(e) = store.record_audit(entry).await {
    tracing::warn!(%action, "failed to record audit entry: {e}");
  }
}

/// Slugs are 1-64 ASCII lowercase letters, digits, and hyphens, and do
/// not start or end with a hyphen.
pub(crate) fn ensure_valid_slug(slug: &str) -> Result<(), ApiError> {
  let chars_ok = slug
    .bytes()
    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
  if slug.is_empty()
    || slug.len() > 64
    || !chars_ok
    || slug.starts_with('-')
    || slug.ends_with('-')
  {
    return Err(ApiError::Validation(format!(
      "invalid slug {slug:?}: use 1-64 lowercase letters, digits, and hyphens"
    )));
  }
  Ok(())
}

/// Deserialiser for PATCH fields where absent, `null`, and a value mean
/// three different things: absent leaves the field alone, `null` clears
/// it, a value replaces it.
pub(crate) fn double_option<'de, T, D>(
  de: D,
) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: serde::Deserializer<'de>,
{
  Deserialize::deserialize(de).map(Some)
}

/// Common `?limit=&offset=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
  limit:  Option<i64>,
  offset: Option<i64>,
}

impl Pagination {
  pub fn limit(&self) -> i64 {
    self.limit.unwrap_or(50).clamp(1, 200)
  }

  pub fn offset(&self) -> i64 {
    self.offset.unwrap_or(0).max(0)
  }
}
