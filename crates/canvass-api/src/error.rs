//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use canvass_core::{Error as CoreError, intake::Rejection};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  /// A token or submission turned away by intake.
  #[error("{0}")]
  Rejected(Rejection),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Rejected(r) => rejection_status(r),
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

fn rejection_status(rejection: &Rejection) -> StatusCode {
  match rejection {
    Rejection::NotFound => StatusCode::NOT_FOUND,
    Rejection::NotActive | Rejection::Expired => StatusCode::GONE,
    Rejection::AlreadyCompleted => StatusCode::CONFLICT,
    Rejection::MissingRequired { .. } | Rejection::InvalidAnswer { .. } => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      CoreError::SurveyNotFound(_) | CoreError::RecipientNotFound(_) => {
        ApiError::NotFound(e.to_string())
      }
      CoreError::SurveyClosed(_) => ApiError::Conflict(e.to_string()),
      CoreError::InvalidDefinition(m) => ApiError::Unprocessable(m),
      CoreError::Rejected(r) => ApiError::Rejected(r),
      CoreError::Store(inner) => ApiError::Store(inner),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Rejected(r) => {
        warn!(rejection = %r, "request rejected");
        json!({ "error": r.to_string(), "rejection": r })
      }
      ApiError::Store(e) => {
        error!(error = %e, "request failed");
        json!({ "error": e.to_string() })
      }
      other => json!({ "error": other.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn rejections_map_to_statuses() {
    let cases = [
      (Rejection::NotFound, StatusCode::NOT_FOUND),
      (Rejection::NotActive, StatusCode::GONE),
      (Rejection::Expired, StatusCode::GONE),
      (Rejection::AlreadyCompleted, StatusCode::CONFLICT),
      (
        Rejection::MissingRequired { question_ids: vec![Uuid::nil()] },
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
      (
        Rejection::InvalidAnswer { question_id: Uuid::nil(), detail: "nope".into() },
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
    ];
    for (rejection, status) in cases {
      assert_eq!(ApiError::Rejected(rejection).status(), status);
    }
  }

  #[test]
  fn core_errors_are_classified() {
    let id = Uuid::new_v4();
    assert_eq!(ApiError::from(CoreError::SurveyNotFound(id)).status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(CoreError::SurveyClosed(id)).status(), StatusCode::CONFLICT);
    assert_eq!(
      ApiError::from(CoreError::InvalidDefinition("x".into())).status(),
      StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
      ApiError::from(CoreError::TokenExhausted(8)).status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
