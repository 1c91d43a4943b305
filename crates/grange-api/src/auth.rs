//! Session authentication and masquerading.
//!
//! - `POST /auth/register` — create an account
//! - `POST /auth/login` — exchange credentials for a bearer token
//! - `POST /auth/logout` — drop the current session
//! - `GET /auth/me` — the effective user and the persons they manage
//! - `POST /auth/masquerade` — act as another user (system admins only)
//! - `DELETE /auth/masquerade` — stop masquerading
//!
//! Bearer and claim tokens are stored as SHA-256 hex, never in the clear.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{StatusCode, header, request::Parts},
};
use chrono::{Duration, Utc};
use grange_core::{
  audit::NewAuditEntry,
  identity::{ActingIdentity, NewUser, Session, User},
  store::DirectoryStore,
};
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  AppState, SESSION_TTL_DAYS, error::ApiError, no_data, record_audit, success,
};

// ─── Token and password primitives ───────────────────────────────────────────

/// SHA-256 hex of a token — the only form that ever reaches the store.
pub(crate) fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(password_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

// ─── Request identity ────────────────────────────────────────────────────────

/// The resolved identity of an authenticated request.
///
/// `user` is the account behind the session; `effective_user` is the one
/// the request acts as, which differs only while a system admin
/// masquerades. Authorization decisions read `identity`; audit entries
/// always name `user`.
pub struct CurrentUser {
  pub user:           User,
  pub effective_user: User,
  pub session:        Session,
  pub identity:       ActingIdentity,
}

impl CurrentUser {
  pub fn masquerading(&self) -> bool {
    self.user.user_id != self.effective_user.user_id
  }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
  parts
    .headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
}

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts)
      .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
    let token_hash = hash_token(token);

    let session = state
      .store
      .get_session_by_token_hash(token_hash)
      .await?
      .ok_or_else(|| ApiError::Unauthorized("invalid session token".into()))?;
    if session.expires_at < Utc::now() {
      return Err(ApiError::Unauthorized("session expired".into()));
    }
    let user = state
      .store
      .get_user(session.user_id)
      .await?
      .ok_or_else(|| ApiError::Unauthorized("invalid session token".into()))?;

    // A masquerade only sticks while the real account still has system
    // privileges.
    let effective_user = match session.masquerade_user_id {
      Some(target_id) if user.is_system_admin => state
        .store
        .get_user(target_id)
        .await?
        .ok_or_else(|| {
          ApiError::Unauthorized("masquerade target no longer exists".into())
        })?,
      _ => user.clone(),
    };

    let owned = state
      .store
      .list_owned_persons(effective_user.user_id)
      .await?;
    let identity = ActingIdentity {
      user_id:          effective_user.user_id,
      is_system_admin:  effective_user.is_system_admin,
      owned_person_ids: owned.into_iter().map(|p| p.person_id).collect(),
    };

    Ok(CurrentUser { user, effective_user, session, identity })
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/register`. Open endpoint; accounts never start with
/// system privileges.
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let email = body.email.trim().to_lowercase();
  if !email.contains('@') {
    return Err(ApiError::Validation(
      "a valid email address is required".into(),
    ));
  }
  if body.password.chars().count() < 8 {
    return Err(ApiError::Validation(
      "passwords must be at least 8 characters".into(),
    ));
  }

  let password_hash = hash_password(&body.password)?;
  let user = state
    .store
    .create_user(NewUser { email, password_hash, is_system_admin: false })
    .await?;

  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(user.user_id, "user.register").entity(user.user_id),
  )
  .await;

  Ok((StatusCode::CREATED, success(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/login`. Returns the bearer token itself exactly once.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let email = body.email.trim().to_lowercase();
  let user = state
    .store
    .get_user_by_email(email)
    .await?
    .filter(|user| verify_password(&body.password, &user.password_hash))
    .ok_or_else(|| {
      ApiError::Unauthorized("unknown email or wrong password".into())
    })?;

  let token = Uuid::new_v4().to_string();
  let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
  let session = state
    .store
    .create_session(user.user_id, hash_token(&token), expires_at)
    .await?;

  Ok(success(json!({
    "token":      token,
    "expires_at": session.expires_at,
    "user":       user,
  })))
}

/// `POST /auth/logout`.
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  state.store.delete_session(current.session.session_id).await?;
  Ok(no_data())
}

/// `GET /auth/me`. Reflects a masquerade: the reported user and persons
/// are the effective ones.
pub async fn me<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let persons = state
    .store
    .list_owned_persons(current.effective_user.user_id)
    .await?;
  Ok(success(json!({
    "user":         current.effective_user,
    "masquerading": current.masquerading(),
    "persons":      persons,
  })))
}

#[derive(Debug, Deserialize)]
pub struct MasqueradeBody {
  pub user_id: i64,
}

/// `POST /auth/masquerade`. Judged on the real account, so a
/// masquerading admin cannot chain into a third one.
pub async fn start_masquerade<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Json(body): Json<MasqueradeBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  if !current.user.is_system_admin {
    return Err(ApiError::Forbidden(
      "Only system administrators can masquerade".into(),
    ));
  }
  let target = state
    .store
    .get_user(body.user_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("user {} not found", body.user_id))
    })?;
  if target.user_id == current.user.user_id {
    return Err(ApiError::Validation("already acting as this user".into()));
  }

  state
    .store
    .set_session_masquerade(current.session.session_id, Some(target.user_id))
    .await?;
  record_audit(
    state.store.as_ref(),
    NewAuditEntry::new(current.user.user_id, "auth.masquerade")
      .entity(target.user_id),
  )
  .await;

  Ok(success(json!({ "user": target })))
}

/// `DELETE /auth/masquerade`. A no-op when not masquerading.
pub async fn stop_masquerade<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .set_session_masquerade(current.session.session_id, None)
    .await?;
  if current.masquerading() {
    record_audit(
      state.store.as_ref(),
      NewAuditEntry::new(current.user.user_id, "auth.unmasquerade")
        .entity(current.effective_user.user_id),
    )
    .await;
  }
  Ok(no_data())
}
