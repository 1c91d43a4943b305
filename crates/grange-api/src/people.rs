//! Person endpoints: profiles, contact information, and interests.
//!
//! - `GET /people`, `POST /people`
//! - `GET /people/{id}`, `PATCH /people/{id}`, `DELETE /people/{id}`
//! - `GET /people/{id}/memberships`
//! - `GET /people/{id}/contact-info`, `POST /people/{id}/contact-info`
//! - `DELETE /contact-info/{id}`
//! - `GET /people/{id}/interests`, `PUT /people/{id}/interests`
//! - `GET /people/{id}/similar`
//!
//! Profiles are readable by any authenticated user. Contact information
//! and interests are restricted to the person's owner and system admins;
//! so are all person mutations.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use grange_core::{
  audit::NewAuditEntry,
  identity::ActingIdentity,
  person::{
    ContactInfo, ContactKind, NewContactInfo, NewPerson, Person, PersonPatch,
  },
  store::DirectoryStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  AppState, Pagination, auth::CurrentUser, ensure_valid_slug, error::ApiError,
  no_data, record_audit, success,
};

// ─── Shared person helpers ───────────────────────────────────────────────────

pub(crate) async fn fetch_person<S: DirectoryStore>(
  store: &S,
  person_id: i64,
) -> Result<Person, ApiError> {
  store
    .get_person(person_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("person {person_id} not found")))
}

/// The owner-or-system-admin rule used by everything person-scoped.
pub(crate) fn can_manage(identity: &ActingIdentity, person: &Person) -> bool {
  identity.is_system_admin || person.user_id == Some(identity.user_id)
}

pub(crate) fn ensure_manages(
  identity: &ActingIdentity,
  person: &Person,
) -> Result<(), ApiError> {
  if can_manage(identity, person) {
    return Ok(());
  }
  Err(ApiError::Forbidden(
    "Only the person's owner or a system administrator can do this".into(),
  ))
}

// ─── Person CRUD ─────────────────────────────────────────────────────────────

/// `GET /people`.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _current: CurrentUser,
  Query(page): Query<Pagination>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let persons = state.store.list_persons(page.limit(), page.offset()).await?;
  Ok(success(persons))
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonBody {
  pub slug:          String,
  pub display_name:  String,
  #[serde(default)]
  pub given_name:    Option<String>,
  #[serde(default)]
  pub family_name:   Option<String>,
  /// Absent: owned by the caller. `null`: unowned. A user id: that user.
  /// The last two require system admin.
  #[serde(default, deserialize_with = "crate::double_option")]
  pub owner_user_id: Option<Option<i64>>,
}

/// `POST /people`.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Json(body): Json<CreatePersonBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  ensure_valid_slug(&body.slug)?;
  if body.display_name.trim().is_empty() {
    return Err(ApiError::Validation("display_name cannot be empty".into()));
  }

  let owner = match body.owner_user_id {
    None => Some(current.identity.user_id),
    Some(owner) => {
      if !current.identity.is_system_admin
        && owner != Some(current.identity.user_id)
      {
        return Err(ApiError::Forbidden(
          "Only system administrators can assign another owner".into(),
        ));
      }
      if let Some(user_id) = owner
        && state.store.get_user(user_id).await?.is_none()
      {
        return Err(ApiError::NotFound(format!("user {user_id} not found")));
      }
      owner
    }
  };

  let person = state
    .store
    .create_person(NewPerson {
      user_id:      owner,
      slug:         body.slug,
      display_name: body.display_name,
      given_name:   body.given_name,
      family_name:  body.family_name,
    })
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "person.create")
      .entity(person.person_id),
  )
  .await;

  Ok((StatusCode::CREATED, success(person)))
}

#[derive(Debug, Serialize)]
pub struct PersonDetail {
  pub person:       Person,
  /// Present only when the requester may see it.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_info: Option<Vec<ContactInfo>>,
}

/// `GET /people/{id}`.
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  let contact_info = if can_manage(&current.identity, &person) {
    Some(state.store.list_contact_info(person_id).await?)
  } else {
    None
  };
  Ok(success(PersonDetail { person, contact_info }))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePersonBody {
  #[serde(default)]
  pub slug:         Option<String>,
  #[serde(default)]
  pub display_name: Option<String>,
  #[serde(default, deserialize_with = "crate::double_option")]
  pub given_name:   Option<Option<String>>,
  #[serde(default, deserialize_with = "crate::double_option")]
  pub family_name:  Option<Option<String>>,
}

/// `PATCH /people/{id}`.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
  Json(body): Json<UpdatePersonBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  if let Some(slug) = &body.slug {
    ensure_valid_slug(slug)?;
  }
  if let Some(name) = &body.display_name
    && name.trim().is_empty()
  {
    return Err(ApiError::Validation("display_name cannot be empty".into()));
  }

  let updated = state
    .store
    .update_person(person_id, PersonPatch {
      slug:         body.slug,
      display_name: body.display_name,
      given_name:   body.given_name,
      family_name:  body.family_name,
    })
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "person.update")
      .entity(person_id),
  )
  .await;

  Ok(success(updated))
}

/// `DELETE /people/{id}`. Cascades over memberships and contact info;
/// the last-admin guard can still veto it with a 400.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  state.store.delete_person(person_id).await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "person.delete")
      .entity(person_id),
  )
  .await;

  Ok(no_data())
}

/// `GET /people/{id}/memberships`.
pub async fn memberships<S>(
  State(state): State<AppState<S>>,
  _current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  fetch_person(state.store.as_ref(), person_id).await?;
  let memberships = state.store.list_person_memberships(person_id).await?;
  Ok(success(memberships))
}

// ─── Contact info ────────────────────────────────────────────────────────────

/// `GET /people/{id}/contact-info`.
pub async fn list_contact_info<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  let infos = state.store.list_contact_info(person_id).await?;
  Ok(success(infos))
}

#[derive(Debug, Deserialize)]
pub struct AddContactInfoBody {
  pub kind:  String,
  pub value: String,
  #[serde(default)]
  pub label: Option<String>,
}

/// `POST /people/{id}/contact-info`.
pub async fn add_contact_info<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
  Json(body): Json<AddContactInfoBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  let Some(kind) = ContactKind::parse(&body.kind) else {
    return Err(ApiError::Validation(format!(
      "unknown contact kind {:?}",
      body.kind
    )));
  };
  if body.value.trim().is_empty() {
    return Err(ApiError::Validation("value cannot be empty".into()));
  }

  let info = state
    .store
    .add_contact_info(NewContactInfo {
      person_id,
      kind,
      value: body.value,
      label: body.label,
    })
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "contact_info.create")
      .entity(info.contact_info_id)
      .detail(json!({ "person_id": person_id })),
  )
  .await;

  Ok((StatusCode::CREATED, success(info)))
}

/// `DELETE /contact-info/{id}`.
pub async fn remove_contact_info<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(contact_info_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let info = state
    .store
    .get_contact_info(contact_info_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("contact info {contact_info_id} not found"))
    })?;
  let person = fetch_person(state.store.as_ref(), info.person_id).await?;
  ensure_manages(&current.identity, &person)?;
  state.store.delete_contact_info(contact_info_id).await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "contact_info.delete")
      .entity(contact_info_id)
      .detail(json!({ "person_id": info.person_id })),
  )
  .await;

  Ok(no_data())
}

// ─── Interests ───────────────────────────────────────────────────────────────

/// `GET /people/{id}/interests`.
pub async fn get_interests<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  let vector = state
    .store
    .get_interest_vector(person_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("person {person_id} has no interest vector"))
    })?;
  Ok(success(json!({ "vector": vector })))
}

#[derive(Debug, Deserialize)]
pub struct SetInterestsBody {
  pub vector: Vec<f32>,
}

/// `PUT /people/{id}/interests`.
pub async fn set_interests<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
  Json(body): Json<SetInterestsBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let person = fetch_person(state.store.as_ref(), person_id).await?;
  ensure_manages(&current.identity, &person)?;
  if body.vector.is_empty() {
    return Err(ApiError::Validation(
      "interest vector cannot be empty".into(),
    ));
  }
  if body.vector.len() > 1024 {
    return Err(ApiError::Validation(
      "interest vector is limited to 1024 entries".into(),
    ));
  }
  if body.vector.iter().any(|v| !v.is_finite()) {
    return Err(ApiError::Validation(
      "interest vector entries must be finite".into(),
    ));
  }

  state.store.set_interest_vector(person_id, body.vector).await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "interests.set")
      .entity(person_id),
  )
  .await;

  Ok(no_data())
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
  limit: Option<i64>,
}

/// `GET /people/{id}/similar`. Ranked by cosine similarity, best first.
pub async fn similar<S>(
  State(state): State<AppState<S>>,
  _current: CurrentUser,
  Path(person_id): Path<i64>,
  Query(params): Query<SimilarParams>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  fetch_person(state.store.as_ref(), person_id).await?;
  let limit = params.limit.unwrap_or(10).clamp(1, 50);
  let ranked = state.store.similar_persons(person_id, limit).await?;
  Ok(success(ranked))
}
