//! Read-only listings for one survey.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/surveys/{id}/invitations` | Invitation states |
//! | `GET`  | `/surveys/{id}/deliveries` | Delivery log, oldest first |
//! | `GET`  | `/surveys/{id}/responses` | Responses with their answers |
//!
//! All three return 404 for an unknown survey rather than an empty list.

use axum::{
  Json,
  extract::{Path, State},
};
use canvass_core::{
  answer::Response,
  channel::ChannelAdapter,
  delivery::DeliveryLogEntry,
  invitation::Invitation,
  store::SurveyStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, surveys::require_survey};

/// `GET /surveys/{id}/invitations`
pub async fn invitations<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Invitation>>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  require_survey(state.store.as_ref(), id).await?;
  let invitations = state
    .store
    .list_invitations(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(invitations))
}

/// `GET /surveys/{id}/deliveries`
pub async fn deliveries<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryLogEntry>>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  require_survey(state.store.as_ref(), id).await?;
  let entries = state
    .store
    .list_deliveries(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(entries))
}

/// `GET /surveys/{id}/responses`
pub async fn responses<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Response>>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  require_survey(state.store.as_ref(), id).await?;
  let responses = state
    .store
    .list_responses(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(responses))
}
