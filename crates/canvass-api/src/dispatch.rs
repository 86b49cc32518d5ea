//! `POST /surveys/{id}/dispatch` runs one dispatch batch.
//!
//! Body: `{"recipients":["<uuid>",…],"channels":["email","messaging"]}`.
//! `channels` may be omitted to use the survey's defaults. Per-recipient
//! failures are reported in the returned `DispatchReport`, not as HTTP errors.

use axum::{
  Json,
  extract::{Path, State},
};
use canvass_core::{
  channel::{Channel, ChannelAdapter},
  dispatch::DispatchReport,
  store::SurveyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DispatchBody {
  pub recipients: Vec<Uuid>,
  #[serde(default)]
  pub channels:   Vec<Channel>,
}

pub async fn handler<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
  Json(body): Json<DispatchBody>,
) -> Result<Json<DispatchReport>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  if body.recipients.is_empty() {
    return Err(ApiError::BadRequest("no recipients given".into()));
  }
  let report = state
    .dispatch
    .dispatch(id, &body.recipients, &body.channels)
    .await?;
  Ok(Json(report))
}
