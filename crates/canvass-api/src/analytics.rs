//! `GET /surveys/{id}/analytics`: completion rate, per-question summaries
//! and the response timeline.

use axum::{
  Json,
  extract::{Path, State},
};
use canvass_core::{analytics::SurveyAnalytics, channel::ChannelAdapter, store::SurveyStore};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn handler<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SurveyAnalytics>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  Ok(Json(state.analytics.survey(id).await?))
}
