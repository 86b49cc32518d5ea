//! Handlers for `/recipients` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/recipients` | Body: `{"full_name":"…","email":"…","phone":"…"}` |
//! | `GET`  | `/recipients/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  channel::ChannelAdapter,
  recipient::{NewRecipient, Recipient},
  store::SurveyStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `POST /recipients`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  Json(body): Json<NewRecipient>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  if body.full_name.trim().is_empty() {
    return Err(ApiError::BadRequest("full_name must not be empty".into()));
  }
  let recipient = state
    .store
    .add_recipient(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(recipient)))
}

/// `GET /recipients/{id}`
pub async fn get_one<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Recipient>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  state
    .store
    .get_recipient(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("recipient {id}")))
}
