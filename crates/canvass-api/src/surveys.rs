//! Handlers for the survey authoring endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/surveys` | Body: `NewSurvey`; 422 on an invalid definition |
//! | `GET`  | `/surveys/{id}` | Survey with ordered questions; 404 if not found |
//! | `POST` | `/surveys/{id}/status` | Body: `{"status":"active"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  channel::ChannelAdapter,
  store::SurveyStore,
  survey::{NewSurvey, Survey, SurveyDefinition, SurveyStatus},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /surveys`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  Json(body): Json<NewSurvey>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  body.validate()?;
  let definition = state
    .store
    .create_survey(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  info!(survey_id = %definition.survey.survey_id, "survey created");
  Ok((StatusCode::CREATED, Json(definition)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /surveys/{id}`
pub async fn get_one<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SurveyDefinition>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  state
    .store
    .get_definition(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("survey {id}")))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: SurveyStatus,
}

/// `POST /surveys/{id}/status`
pub async fn set_status<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Survey>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  let survey = state
    .store
    .set_survey_status(id, body.status)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id}")))?;
  info!(survey_id = %id, status = %survey.status, "survey status changed");
  Ok(Json(survey))
}

/// Load the survey or fail with 404. Shared by the per-survey listings.
pub(crate) async fn require_survey<S>(store: &S, id: Uuid) -> Result<Survey, ApiError>
where
  S: SurveyStore,
{
  store
    .get_survey(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id}")))
}
