//! Public response intake: resolve access tokens and accept submissions.
//!
//! Respondents are unauthenticated; the token in the access URL is the only
//! credential. Resolving a usable token opens its invitation, accepting a
//! submission completes it exactly once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  answer::{CompletedSubmission, CompletionOutcome, NewAnswer, Response, Submission},
  invitation::{Invitation, InvitationStatus},
  store::SurveyStore,
  strategy::{self, FieldSpec},
  survey::{Survey, SurveyDefinition, SurveyStatus},
};

/// Why a token or a submission was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
  #[error("invitation not found")]
  NotFound,

  #[error("survey is not open")]
  NotActive,

  #[error("survey has ended")]
  Expired,

  #[error("survey already completed")]
  AlreadyCompleted,

  #[error("{} required question(s) unanswered", question_ids.len())]
  MissingRequired { question_ids: Vec<Uuid> },

  #[error("invalid answer for question {question_id}: {detail}")]
  InvalidAnswer { question_id: Uuid, detail: String },
}

/// A resolved, opened invitation together with the survey it belongs to.
#[derive(Debug, Clone)]
pub struct OpenedInvitation {
  pub invitation: Invitation,
  pub definition: SurveyDefinition,
}

impl OpenedInvitation {
  pub fn form(&self) -> Vec<FieldSpec> { form(&self.definition) }
}

pub struct Intake<S> {
  store: Arc<S>,
}

impl<S: SurveyStore> Intake<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Resolve `token` and mark its invitation opened.
  pub async fn resolve(&self, token: &str) -> Result<OpenedInvitation> {
    self.resolve_at(token, None, Utc::now()).await
  }

  /// [`resolve`](Self::resolve), additionally requiring the invitation to
  /// belong to `survey_id`.
  pub async fn resolve_in(&self, survey_id: Uuid, token: &str) -> Result<OpenedInvitation> {
    self.resolve_at(token, Some(survey_id), Utc::now()).await
  }

  pub async fn resolve_at(
    &self,
    token: &str,
    survey_id: Option<Uuid>,
    now: DateTime<Utc>,
  ) -> Result<OpenedInvitation> {
    let (invitation, definition) = self.locate(token, survey_id, now).await?;
    let invitation = self.open_if_unopened(invitation, token, now).await?;
    Ok(OpenedInvitation { invitation, definition })
  }

  /// Look up a usable invitation and its survey without writing anything.
  async fn locate(
    &self,
    token: &str,
    survey_id: Option<Uuid>,
    now: DateTime<Utc>,
  ) -> Result<(Invitation, SurveyDefinition)> {
    let invitation = self
      .store
      .find_invitation_by_token(token)
      .await
      .map_err(Error::store)?
      .filter(|inv| survey_id.is_none_or(|id| inv.survey_id == id))
      .ok_or(Rejection::NotFound)?;

    let definition = self
      .store
      .get_definition(invitation.survey_id)
      .await
      .map_err(Error::store)?
      .ok_or(Rejection::NotFound)?;

    if let Err(rejection) = check_availability(&definition.survey, &invitation, now) {
      debug!(invitation_id = %invitation.invitation_id, %rejection, "token refused");
      return Err(rejection.into());
    }
    Ok((invitation, definition))
  }

  async fn open_if_unopened(
    &self,
    invitation: Invitation,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Invitation> {
    match invitation.status {
      InvitationStatus::Pending | InvitationStatus::Sent => self.open(invitation, token, now).await,
      _ => Ok(invitation),
    }
  }

  async fn open(
    &self,
    invitation: Invitation,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Invitation> {
    let transitioned = self
      .store
      .transition_invitation(invitation.invitation_id, InvitationStatus::Opened, now)
      .await
      .map_err(Error::store)?;
    if let Some(opened) = transitioned {
      debug!(invitation_id = %opened.invitation_id, "invitation opened");
      return Ok(opened);
    }

    // Someone else moved it first; take whatever state it is in now.
    let current = self
      .store
      .find_invitation_by_token(token)
      .await
      .map_err(Error::store)?
      .ok_or(Rejection::NotFound)?;
    match current.status {
      InvitationStatus::Opened => Ok(current),
      InvitationStatus::Completed => Err(Rejection::AlreadyCompleted.into()),
      _ => Err(Rejection::NotFound.into()),
    }
  }

  /// Validate `submission` and record it as the token holder's response.
  ///
  /// The payload is validated before the invitation is touched, so a
  /// rejected submission leaves an unopened invitation unopened.
  pub async fn accept(&self, token: &str, submission: &Submission) -> Result<Response> {
    self.accept_at(token, None, submission, Utc::now()).await
  }

  pub async fn accept_in(
    &self,
    survey_id: Uuid,
    token: &str,
    submission: &Submission,
  ) -> Result<Response> {
    self
      .accept_at(token, Some(survey_id), submission, Utc::now())
      .await
  }

  pub async fn accept_at(
    &self,
    token: &str,
    survey_id: Option<Uuid>,
    submission: &Submission,
    now: DateTime<Utc>,
  ) -> Result<Response> {
    let (invitation, definition) = self.locate(token, survey_id, now).await?;

    let answers = validate_submission(&definition, submission).inspect_err(|rejection| {
      debug!(invitation_id = %invitation.invitation_id, %rejection, "submission refused");
    })?;

    let invitation = self.open_if_unopened(invitation, token, now).await?;

    let outcome = self
      .store
      .complete_invitation(CompletedSubmission {
        invitation_id: invitation.invitation_id,
        survey_id: invitation.survey_id,
        recipient_id: invitation.recipient_id,
        submitted_at: now,
        answers,
      })
      .await
      .map_err(Error::store)?;

    match outcome {
      CompletionOutcome::Recorded(response) => {
        info!(
          survey_id = %response.survey_id,
          response_id = %response.response_id,
          answers = response.answers.len(),
          "response recorded"
        );
        Ok(response)
      }
      CompletionOutcome::AlreadyCompleted => {
        warn!(invitation_id = %invitation.invitation_id, "duplicate submission");
        Err(Rejection::AlreadyCompleted.into())
      }
    }
  }
}

/// Whether `invitation` may be answered at `now`.
///
/// The survey window is checked before the invitation's own state, so a past
/// end date wins over everything else.
pub fn check_availability(
  survey: &Survey,
  invitation: &Invitation,
  now: DateTime<Utc>,
) -> Result<(), Rejection> {
  if survey.status != SurveyStatus::Active || !survey.window.has_started(now) {
    return Err(Rejection::NotActive);
  }
  if survey.window.has_ended(now) {
    return Err(Rejection::Expired);
  }
  match invitation.status {
    InvitationStatus::Completed => Err(Rejection::AlreadyCompleted),
    InvitationStatus::Failed => Err(Rejection::NotFound),
    _ => Ok(()),
  }
}

/// Turn a raw submission into validated answers, in question order.
///
/// Values for unknown question ids are ignored. Unanswered optional questions
/// produce no answer.
pub fn validate_submission(
  definition: &SurveyDefinition,
  submission: &Submission,
) -> Result<Vec<NewAnswer>, Rejection> {
  let mut answers = Vec::with_capacity(definition.questions.len());
  let mut missing = Vec::new();

  for question in &definition.questions {
    let validated = match submission.get(&question.question_id) {
      Some(raw) => (strategy::for_type(question.question_type).validate)(question, raw)
        .map_err(|detail| Rejection::InvalidAnswer {
          question_id: question.question_id,
          detail,
        })?,
      None => None,
    };

    match validated {
      Some(value) => answers.push(NewAnswer::new(question, value)?),
      None if question.required => missing.push(question.question_id),
      None => {}
    }
  }

  if !missing.is_empty() {
    return Err(Rejection::MissingRequired { question_ids: missing });
  }
  Ok(answers)
}

/// The public form for `definition`: one field per question, in position
/// order.
pub fn form(definition: &SurveyDefinition) -> Vec<FieldSpec> {
  let mut fields: Vec<FieldSpec> = definition
    .questions
    .iter()
    .map(|q| (strategy::for_type(q.question_type).render)(q))
    .collect();
  fields.sort_by_key(|f| f.position);
  fields
}
