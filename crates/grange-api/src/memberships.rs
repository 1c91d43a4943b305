//! Membership mutation endpoints.
//!
//! - `POST /memberships`
//! - `PATCH /memberships/{id}`
//! - `PUT /memberships/{id}`
//! - `DELETE /memberships/{id}`
//!
//! Checks run in a fixed order so the reported error is deterministic:
//! existence first (404), then authorization (403), then the last-admin
//! invariant (400). The invariant itself is enforced inside the store's
//! transaction; the handlers only decide who may attempt the mutation.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use grange_core::{
  audit::NewAuditEntry,
  authz,
  group::{Membership, NewMembership},
  identity::ActingIdentity,
  store::DirectoryStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
  AppState, auth::CurrentUser, error::ApiError, groups, no_data, people,
  record_audit, success,
};

const NOT_GROUP_ADMIN: &str =
  "Only group administrators can modify group memberships";
const OWN_ADMIN_STATUS: &str = "You cannot modify your own admin status";

async fn fetch_membership<S: DirectoryStore>(
  store: &S,
  membership_id: i64,
) -> Result<Membership, ApiError> {
  store
    .get_membership(membership_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("membership {membership_id} not found"))
    })
}

async fn ensure_can_modify<S: DirectoryStore>(
  store: &S,
  identity: &ActingIdentity,
  group_id: i64,
) -> Result<(), ApiError> {
  let admin_ids = store.group_admin_person_ids(group_id).await?;
  if authz::can_modify_group_memberships(identity, &admin_ids) {
    return Ok(());
  }
  Err(ApiError::Forbidden(NOT_GROUP_ADMIN.into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipBody {
  pub person_id: i64,
  pub group_id:  i64,
  #[serde(default)]
  pub is_admin:  bool,
}

/// `POST /memberships`. A group admin may seat a person they own as
/// admin directly; the self-change rule only restricts flipping an
/// existing flag.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Json(body): Json<CreateMembershipBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  people::fetch_person(store, body.person_id).await?;
  groups::fetch_group(store, body.group_id).await?;
  ensure_can_modify(store, &current.identity, body.group_id).await?;

  let membership = store
    .create_membership(NewMembership {
      person_id: body.person_id,
      group_id:  body.group_id,
      is_admin:  body.is_admin,
    })
    .await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "membership.create")
      .entity(membership.membership_id)
      .detail(json!({
        "person_id": membership.person_id,
        "group_id":  membership.group_id,
        "is_admin":  membership.is_admin,
      })),
  )
  .await;

  Ok((StatusCode::CREATED, success(membership)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMembershipBody {
  #[serde(default)]
  pub is_admin: Option<bool>,
}

/// `PATCH /memberships/{id}`. Without `is_admin` this is a no-op that
/// returns the current record.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(membership_id): Path<i64>,
  Json(body): Json<UpdateMembershipBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let membership = fetch_membership(store, membership_id).await?;
  ensure_can_modify(store, &current.identity, membership.group_id).await?;

  let Some(is_admin) = body.is_admin else {
    return Ok(success(membership));
  };
  if !authz::can_change_admin_flag(
    &current.identity,
    membership.person_id,
    membership.is_admin,
    is_admin,
  ) {
    return Err(ApiError::Forbidden(OWN_ADMIN_STATUS.into()));
  }

  let updated = store.set_membership_admin(membership_id, is_admin).await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "membership.update")
      .entity(membership_id)
      .detail(json!({ "is_admin": is_admin })),
  )
  .await;

  Ok(success(updated))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceMembershipBody {
  pub person_id: i64,
  pub group_id:  i64,
  pub is_admin:  bool,
}

/// `PUT /memberships/{id}`. The person/group pair is the membership's
/// identity and must match the stored row; a full replace can only move
/// the admin flag.
pub async fn replace<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(membership_id): Path<i64>,
  Json(body): Json<ReplaceMembershipBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let membership = fetch_membership(store, membership_id).await?;
  ensure_can_modify(store, &current.identity, membership.group_id).await?;

  if body.person_id != membership.person_id
    || body.group_id != membership.group_id
  {
    return Err(ApiError::Validation(
      "person_id and group_id of an existing membership cannot be changed"
        .into(),
    ));
  }
  if !authz::can_change_admin_flag(
    &current.identity,
    membership.person_id,
    membership.is_admin,
    body.is_admin,
  ) {
    return Err(ApiError::Forbidden(OWN_ADMIN_STATUS.into()));
  }

  let updated = store
    .set_membership_admin(membership_id, body.is_admin)
    .await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "membership.replace")
      .entity(membership_id)
      .detail(json!({
        "person_id": updated.person_id,
        "group_id":  updated.group_id,
        "is_admin":  updated.is_admin,
      })),
  )
  .await;

  Ok(success(updated))
}

/// `DELETE /memberships/{id}`. Removing a group's last admin fails
/// unless that admin is also the group's only member.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(membership_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let membership = fetch_membership(store, membership_id).await?;
  ensure_can_modify(store, &current.identity, membership.group_id).await?;
  store.delete_membership(membership_id).await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "membership.delete")
      .entity(membership_id)
      .detail(json!({
        "person_id": membership.person_id,
        "group_id":  membership.group_id,
      })),
  )
  .await;

  Ok(no_data())
}
