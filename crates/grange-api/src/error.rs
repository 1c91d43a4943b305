//! API error type and its rendering as the response envelope.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Anything a handler can fail with. Every variant renders as
/// `{"success": false, "message": …}` with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing, unknown, or expired session token.
  #[error("{0}")]
  Unauthorized(String),
  /// The acting identity is not allowed to do this.
  #[error("{0}")]
  Forbidden(String),
  /// A referenced row does not exist (or is soft-deleted).
  #[error("{0}")]
  NotFound(String),
  /// Malformed or inconsistent input.
  #[error("{0}")]
  Validation(String),
  /// The operation would break a domain invariant.
  #[error("{0}")]
  Invariant(String),
  /// Storage or serialization trouble. The detail goes to the log; the
  /// client sees a generic message.
  #[error("{0}")]
  Internal(String),
}

impl From<grange_core::Error> for ApiError {
  fn from(err: grange_core::Error) -> Self {
    use grange_core::Error as E;

    match err {
      E::PersonNotFound(id) => {
        ApiError::NotFound(format!("person {id} not found"))
      }
      E::GroupNotFound(id) => {
        ApiError::NotFound(format!("group {id} not found"))
      }
      E::MembershipNotFound(id) => {
        ApiError::NotFound(format!("membership {id} not found"))
      }
      E::ContactInfoNotFound(id) => {
        ApiError::NotFound(format!("contact info {id} not found"))
      }
      E::ClaimNotFound(_) => ApiError::NotFound("claim not found".into()),
      E::NoInterestVector(id) => {
        ApiError::NotFound(format!("person {id} has no interest vector"))
      }
      E::SessionNotFound(_) => {
        ApiError::Unauthorized("session no longer exists".into())
      }
      E::ClaimExpired(_) => {
        ApiError::Validation("claim token has expired".into())
      }
      E::ClaimAlreadyRedeemed(_) => {
        ApiError::Validation("claim token has already been redeemed".into())
      }
      E::LastAdmin(_) => ApiError::Invariant(
        "Cannot remove the last administrator of a group".into(),
      ),
      E::AlreadyMember { person_id, group_id } => ApiError::Validation(
        format!("person {person_id} is already a member of group {group_id}"),
      ),
      E::DuplicateSlug(slug) => {
        ApiError::Validation(format!("slug {slug:?} is already in use"))
      }
      E::DuplicateEmail(email) => {
        ApiError::Validation(format!("email {email:?} is already registered"))
      }
      E::GroupCycle(_) => ApiError::Validation(
        "a group cannot be moved under one of its own subgroups".into(),
      ),
      E::GroupHasSubgroups(id) => {
        ApiError::Validation(format!("group {id} still has subgroups"))
      }
      E::Serialization(e) => ApiError::Internal(e.to_string()),
      E::Storage(e) => ApiError::Internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::Unauthorized(m) => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "success": false, "message": m })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer"),
        );
        return res;
      }
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
      ApiError::Validation(m) | ApiError::Invariant(m) => {
        (StatusCode::BAD_REQUEST, m)
      }
      ApiError::Internal(m) => {
        tracing::error!("request failed: {m}");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "success": false, "message": message })))
      .into_response()
  }
}
