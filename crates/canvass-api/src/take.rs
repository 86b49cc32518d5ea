//! Public, unauthenticated take-survey endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/surveys/{id}/take?token=…` | Opens the invitation, returns the form |
//! | `POST` | `/surveys/{id}/take?token=…` | Body: `{"<question id>": value, …}`; 201 |
//!
//! The token is the only credential. A token issued for a different survey
//! than the one in the path is treated as unknown.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  answer::Submission,
  channel::ChannelAdapter,
  store::SurveyStore,
  strategy::FieldSpec,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct TakeParams {
  pub token: String,
}

/// The public form for one opened invitation.
#[derive(Debug, Serialize, Deserialize)]
pub struct TakeForm {
  pub survey_id:   Uuid,
  pub title:       String,
  pub description: String,
  pub ends_at:     DateTime<Utc>,
  pub fields:      Vec<FieldSpec>,
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

/// `GET /surveys/{id}/take?token=…`
pub async fn form<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
  Query(params): Query<TakeParams>,
) -> Result<Json<TakeForm>, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  let opened = state.intake.resolve_in(id, &params.token).await?;
  let fields = opened.form();
  let survey = opened.definition.survey;
  Ok(Json(TakeForm {
    survey_id: survey.survey_id,
    title: survey.title,
    description: survey.description,
    ends_at: survey.window.ends_at,
    fields,
  }))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /surveys/{id}/take?token=…`
pub async fn submit<S, A>(
  State(state): State<AppState<S, A>>,
  Path(id): Path<Uuid>,
  Query(params): Query<TakeParams>,
  Json(body): Json<Submission>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  let response = state.intake.accept_in(id, &params.token, &body).await?;
  info!(survey_id = %id, response_id = %response.response_id, "response recorded");
  Ok((StatusCode::CREATED, Json(response)))
}
