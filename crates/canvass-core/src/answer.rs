//! Responses and answers.
//!
//! An answer's payload is a tagged union whose variant must match the type of
//! the question it answers. The variant name doubles as the `kind`
//! discriminant stored by backends.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  intake::Rejection,
  survey::{Question, QuestionType},
};

/// Raw submission payload: question id → JSON value.
pub type Submission = HashMap<Uuid, serde_json::Value>;

// ─── AnswerValue ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AnswerValue {
  Text(String),
  Number(f64),
  Date(NaiveDate),
  /// Selected choice ids, in the order the respondent gave them.
  Choices(Vec<Uuid>),
}

impl AnswerValue {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Text(_) => "text",
      Self::Number(_) => "number",
      Self::Date(_) => "date",
      Self::Choices(_) => "choices",
    }
  }

  /// Whether this payload shape is valid for `question_type`.
  pub fn fits(&self, question_type: QuestionType) -> bool {
    use QuestionType::*;
    match self {
      Self::Text(_) => matches!(question_type, ShortText | LongText),
      Self::Number(_) => matches!(question_type, Numeric | Rating),
      Self::Date(_) => question_type == Date,
      Self::Choices(ids) => match question_type {
        SingleChoice => ids.len() == 1,
        MultiChoice => !ids.is_empty(),
        _ => false,
      },
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Serialise the inner payload (without the type tag).
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from a stored discriminant and payload.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Stored records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id:   Uuid,
  pub response_id: Uuid,
  pub question_id: Uuid,
  pub value:       AnswerValue,
}

/// One recipient's completed submission for one survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub response_id:   Uuid,
  pub survey_id:     Uuid,
  pub recipient_id:  Uuid,
  pub invitation_id: Uuid,
  pub is_complete:   bool,
  pub submitted_at:  DateTime<Utc>,
  pub answers:       Vec<Answer>,
}

impl Response {
  pub fn answer_for(&self, question_id: Uuid) -> Option<&Answer> {
    self.answers.iter().find(|a| a.question_id == question_id)
  }
}

// ─── Write input ─────────────────────────────────────────────────────────────

/// A validated answer waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
  pub question_id: Uuid,
  pub value:       AnswerValue,
}

impl NewAnswer {
  /// Pair `value` with `question`, rejecting payloads of the wrong shape.
  pub fn new(question: &Question, value: AnswerValue) -> Result<Self, Rejection> {
    if !value.fits(question.question_type) {
      return Err(Rejection::InvalidAnswer {
        question_id: question.question_id,
        detail:      format!(
          "{} answer does not fit a {} question",
          value.discriminant(),
          question.question_type
        ),
      });
    }
    Ok(Self { question_id: question.question_id, value })
  }
}

/// Everything the store writes atomically when a submission is accepted.
#[derive(Debug, Clone)]
pub struct CompletedSubmission {
  pub invitation_id: Uuid,
  pub survey_id:     Uuid,
  pub recipient_id:  Uuid,
  pub submitted_at:  DateTime<Utc>,
  pub answers:       Vec<NewAnswer>,
}

/// Result of [`crate::store::SurveyStore::complete_invitation`].
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
  Recorded(Response),
  /// The invitation was no longer `opened`; nothing was written.
  AlreadyCompleted,
}
