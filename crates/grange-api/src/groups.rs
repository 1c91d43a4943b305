//! Group endpoints: CRUD, hierarchy, and the member list.
//!
//! - `GET /groups`, `POST /groups`
//! - `GET /groups/{id}`, `PATCH /groups/{id}`, `DELETE /groups/{id}`
//! - `GET /groups/{id}/memberships`
//!
//! Any authenticated user can create a group, but a non-system-admin
//! must seat an initial administrator they own; metadata changes and
//! deletion are reserved for group admins and system admins.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use grange_core::{
  audit::NewAuditEntry,
  authz,
  group::{Group, GroupPatch, NewGroup},
  identity::ActingIdentity,
  store::DirectoryStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  AppState, Pagination, auth::CurrentUser, ensure_valid_slug, error::ApiError,
  no_data, people, record_audit, success,
};

// ─── Shared group helpers ────────────────────────────────────────────────────

pub(crate) async fn fetch_group<S: DirectoryStore>(
  store: &S,
  group_id: i64,
) -> Result<Group, ApiError> {
  store
    .get_group(group_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("group {group_id} not found")))
}

/// Group-admin-or-system-admin gate for group metadata changes.
async fn ensure_group_admin<S: DirectoryStore>(
  store: &S,
  identity: &ActingIdentity,
  group_id: i64,
) -> Result<(), ApiError> {
  let admin_ids = store.group_admin_person_ids(group_id).await?;
  if authz::can_modify_group_memberships(identity, &admin_ids) {
    return Ok(());
  }
  Err(ApiError::Forbidden(
    "Only group administrators can edit this group".into(),
  ))
}

fn default_true() -> bool {
  true
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /groups`.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _current: CurrentUser,
  Query(page): Query<Pagination>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let groups = state.store.list_groups(page.limit(), page.offset()).await?;
  Ok(success(groups))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
  pub slug:                    String,
  pub name:                    String,
  #[serde(default)]
  pub parent_group_id:         Option<i64>,
  #[serde(default = "default_true")]
  pub members_visible:         bool,
  #[serde(default = "default_true")]
  pub subgroups_allowed:       bool,
  #[serde(default)]
  pub initial_admin_person_id: Option<i64>,
}

/// `POST /groups`. The initial admin membership is created atomically
/// with the group, so the last-admin invariant holds from the start.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Json(body): Json<CreateGroupBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  ensure_valid_slug(&body.slug)?;
  if body.name.trim().is_empty() {
    return Err(ApiError::Validation("name cannot be empty".into()));
  }

  if let Some(parent_id) = body.parent_group_id {
    let parent = fetch_group(state.store.as_ref(), parent_id).await?;
    if !parent.subgroups_allowed {
      return Err(ApiError::Validation(format!(
        "group {parent_id} does not allow subgroups"
      )));
    }
  }

  let initial_admin = match body.initial_admin_person_id {
    Some(person_id) => {
      let person =
        people::fetch_person(state.store.as_ref(), person_id).await?;
      if !current.identity.is_system_admin
        && !current.identity.owns(person.person_id)
      {
        return Err(ApiError::Forbidden(
          "The initial administrator must be a person you manage".into(),
        ));
      }
      Some(person.person_id)
    }
    None if current.identity.is_system_admin => None,
    None => {
      return Err(ApiError::Validation(
        "an initial administrator is required".into(),
      ));
    }
  };

  let group = state
    .store
    .create_group(
      NewGroup {
        slug:              body.slug,
        name:              body.name,
        parent_group_id:   body.parent_group_id,
        members_visible:   body.members_visible,
        subgroups_allowed: body.subgroups_allowed,
      },
      initial_admin,
    )
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "group.create")
      .entity(group.group_id),
  )
  .await;

  Ok((StatusCode::CREATED, success(group)))
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
  pub group:     Group,
  pub subgroups: Vec<Group>,
}

/// `GET /groups/{id}`.
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _current: CurrentUser,
  Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let group = fetch_group(state.store.as_ref(), group_id).await?;
  let subgroups = state.store.list_subgroups(group_id).await?;
  Ok(success(GroupDetail { group, subgroups }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupBody {
  #[serde(default)]
  pub slug:              Option<String>,
  #[serde(default)]
  pub name:              Option<String>,
  /// Absent: keep the parent. `null`: detach to top level. An id:
  /// re-parent there (cycle-checked).
  #[serde(default, deserialize_with = "crate::double_option")]
  pub parent_group_id:   Option<Option<i64>>,
  #[serde(default)]
  pub members_visible:   Option<bool>,
  #[serde(default)]
  pub subgroups_allowed: Option<bool>,
}

/// `PATCH /groups/{id}`.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(group_id): Path<i64>,
  Json(body): Json<UpdateGroupBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  fetch_group(state.store.as_ref(), group_id).await?;
  ensure_group_admin(state.store.as_ref(), &current.identity, group_id)
    .await?;
  if let Some(slug) = &body.slug {
    ensure_valid_slug(slug)?;
  }
  if let Some(name) = &body.name
    && name.trim().is_empty()
  {
    return Err(ApiError::Validation("name cannot be empty".into()));
  }
  if let Some(Some(parent_id)) = body.parent_group_id {
    let parent = fetch_group(state.store.as_ref(), parent_id).await?;
    if !parent.subgroups_allowed {
      return Err(ApiError::Validation(format!(
        "group {parent_id} does not allow subgroups"
      )));
    }
  }

  let updated = state
    .store
    .update_group(group_id, GroupPatch {
      slug:              body.slug,
      name:              body.name,
      parent_group_id:   body.parent_group_id,
      members_visible:   body.members_visible,
      subgroups_allowed: body.subgroups_allowed,
    })
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "group.update")
      .entity(group_id),
  )
  .await;

  Ok(success(updated))
}

/// `DELETE /groups/{id}`. Subgroups must go first; memberships go with
/// the group.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  fetch_group(state.store.as_ref(), group_id).await?;
  ensure_group_admin(state.store.as_ref(), &current.identity, group_id)
    .await?;
  state.store.delete_group(group_id).await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "group.delete")
      .entity(group_id),
  )
  .await;

  Ok(no_data())
}

/// `GET /groups/{id}/memberships`. A hidden member list stays readable
/// for members, group admins, and system admins.
pub async fn memberships<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let group = fetch_group(state.store.as_ref(), group_id).await?;
  let memberships = state.store.list_group_memberships(group_id).await?;

  if !group.members_visible {
    let is_member = memberships
      .iter()
      .any(|m| current.identity.owns(m.person_id));
    let admin_ids: Vec<i64> = memberships
      .iter()
      .filter(|m| m.is_admin)
      .map(|m| m.person_id)
      .collect();
    if !is_member
      && !authz::can_modify_group_memberships(&current.identity, &admin_ids)
    {
      return Err(ApiError::Forbidden(
        "This group's member list is private".into(),
      ));
    }
  }

  Ok(success(memberships))
}
