//! Ownership claims: invite tokens that hand a person to another account.
//!
//! - `POST /people/{id}/claims` — issue a claim token
//! - `GET /people/{id}/claims` — list a person's claims
//! - `POST /claims/redeem` — redeem a token, taking ownership
//!
//! The token itself appears exactly once, in the issue response; the
//! store only ever sees its hash. Tokens are single-use and expire.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use chrono::{Duration, Utc};
use grange_core::{audit::NewAuditEntry, store::DirectoryStore};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState, CLAIM_TTL_DAYS,
  auth::{CurrentUser, hash_token},
  error::ApiError,
  people, record_audit, success,
};

/// `POST /people/{id}/claims`.
pub async fn issue<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let person = people::fetch_person(store, person_id).await?;
  people::ensure_manages(&current.identity, &person)?;

  let token = Uuid::new_v4().to_string();
  let expires_at = Utc::now() + Duration::days(CLAIM_TTL_DAYS);
  let claim = store
    .create_claim(
      person_id,
      hash_token(&token),
      current.identity.user_id,
      expires_at,
    )
    .await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "claim.create")
      .entity(claim.claim_id)
      .detail(json!({ "person_id": person_id })),
  )
  .await;

  Ok((StatusCode::CREATED, success(json!({ "claim": claim, "token": token }))))
}

/// `GET /people/{id}/claims`.
pub async fn list_for_person<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Path(person_id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let person = people::fetch_person(store, person_id).await?;
  people::ensure_manages(&current.identity, &person)?;
  let claims = store.list_person_claims(person_id).await?;
  Ok(success(claims))
}

#[derive(Debug, Deserialize)]
pub struct RedeemClaimBody {
  pub token: String,
}

/// `POST /claims/redeem`. Hands the person to the caller's account.
pub async fn redeem<S>(
  State(state): State<AppState<S>>,
  current: CurrentUser,
  Json(body): Json<RedeemClaimBody>,
) -> Result<Json<Value>, ApiError>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let claim = store
    .get_claim_by_token_hash(hash_token(&body.token))
    .await?
    .ok_or_else(|| ApiError::NotFound("claim not found".into()))?;

  let person = store
    .redeem_claim(claim.claim_id, current.identity.user_id, Utc::now())
    .await?;

  record_audit(
    store,
    NewAuditEntry::new(current.user.user_id, "claim.redeem")
      .entity(claim.claim_id)
      .detail(json!({ "person_id": person.person_id })),
  )
  .await;

  Ok(success(person))
}
