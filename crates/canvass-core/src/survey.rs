//! Survey definitions: the survey record, its ordered questions and choices.
//!
//! Definitions are authored elsewhere. From the core's point of view they are
//! read-only, apart from the dispatch and response counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, channel::Channel, template};

/// Rating questions without an explicit scale are scored 1 to 5.
pub const DEFAULT_RATING_MAX: u8 = 5;

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SurveyStatus {
  Draft,
  Active,
  Closed,
}

/// The period during which invitations may be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyWindow {
  pub starts_at: DateTime<Utc>,
  pub ends_at:   DateTime<Utc>,
}

impl SurveyWindow {
  pub fn has_started(&self, now: DateTime<Utc>) -> bool { now >= self.starts_at }

  pub fn has_ended(&self, now: DateTime<Utc>) -> bool { now > self.ends_at }
}

/// Per-channel message templates. `None` falls back to the built-in defaults
/// in [`crate::template`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplates {
  pub email_subject:  Option<String>,
  pub email_body:     Option<String>,
  pub messaging_body: Option<String>,
}

/// Persisted dispatch and response counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyCounters {
  /// Distinct invitations issued by dispatch.
  pub total_sent:         u64,
  pub email_sent:         u64,
  pub messaging_sent:     u64,
  pub responses_received: u64,
}

impl SurveyCounters {
  pub fn sent_on(&self, channel: Channel) -> u64 {
    match channel {
      Channel::Email => self.email_sent,
      Channel::Messaging => self.messaging_sent,
    }
  }
}

/// An additive change to [`SurveyCounters`], applied by the store in a single
/// statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
  pub total_sent:         u64,
  pub email_sent:         u64,
  pub messaging_sent:     u64,
  pub responses_received: u64,
}

impl CounterDelta {
  pub fn record_delivery(&mut self, channel: Channel) {
    match channel {
      Channel::Email => self.email_sent += 1,
      Channel::Messaging => self.messaging_sent += 1,
    }
  }

  pub fn is_empty(&self) -> bool { *self == Self::default() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
  pub survey_id:        Uuid,
  pub title:            String,
  pub description:      String,
  pub status:           SurveyStatus,
  pub window:           SurveyWindow,
  pub templates:        MessageTemplates,
  /// Channels used when a dispatch request names none.
  pub default_channels: Vec<Channel>,
  pub counters:         SurveyCounters,
  pub created_at:       DateTime<Utc>,
}

// ─── Questions ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionType {
  ShortText,
  LongText,
  SingleChoice,
  MultiChoice,
  Numeric,
  Date,
  Rating,
}

impl QuestionType {
  pub fn is_choice(self) -> bool {
    matches!(self, Self::SingleChoice | Self::MultiChoice)
  }

  pub fn is_text(self) -> bool { matches!(self, Self::ShortText | Self::LongText) }

  pub fn is_numeric(self) -> bool { matches!(self, Self::Numeric | Self::Rating) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
  pub choice_id:   Uuid,
  pub question_id: Uuid,
  pub position:    u32,
  pub label:       String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub question_id:   Uuid,
  pub survey_id:     Uuid,
  /// Unique within the survey; defines presentation and analytics order.
  pub position:      u32,
  pub prompt:        String,
  pub help_text:     Option<String>,
  pub question_type: QuestionType,
  pub required:      bool,
  /// Upper bound of the scale for rating questions.
  pub rating_max:    Option<u8>,
  /// Ordered by position; empty for non-choice questions.
  pub choices:       Vec<Choice>,
}

impl Question {
  pub fn rating_scale(&self) -> u8 { self.rating_max.unwrap_or(DEFAULT_RATING_MAX) }

  pub fn choice(&self, choice_id: Uuid) -> Option<&Choice> {
    self.choices.iter().find(|c| c.choice_id == choice_id)
  }
}

// ─── Definition ──────────────────────────────────────────────────────────────

/// A survey together with its ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDefinition {
  pub survey:    Survey,
  /// Ordered by position.
  pub questions: Vec<Question>,
}

impl SurveyDefinition {
  pub fn question(&self, question_id: Uuid) -> Option<&Question> {
    self.questions.iter().find(|q| q.question_id == question_id)
  }

  /// Check the definition can be sent to recipients: every choice question
  /// offers at least two choices and rating scales are non-empty.
  pub fn validate_dispatchable(&self) -> Result<()> {
    for q in &self.questions {
      if q.question_type.is_choice() && q.choices.len() < 2 {
        return Err(Error::InvalidDefinition(format!(
          "question {} ({:?}) needs at least two choices, has {}",
          q.position,
          q.prompt,
          q.choices.len()
        )));
      }
      if q.question_type == QuestionType::Rating && q.rating_scale() == 0 {
        return Err(Error::InvalidDefinition(format!(
          "rating question {} has an empty scale",
          q.position
        )));
      }
    }
    Ok(())
  }
}

// ─── Authoring input ─────────────────────────────────────────────────────────

/// Input to [`crate::store::SurveyStore::create_survey`]. Identifiers,
/// positions, counters and `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurvey {
  pub title:            String,
  #[serde(default)]
  pub description:      String,
  #[serde(default = "default_status")]
  pub status:           SurveyStatus,
  pub window:           SurveyWindow,
  #[serde(default)]
  pub templates:        MessageTemplates,
  #[serde(default = "default_channels")]
  pub default_channels: Vec<Channel>,
  #[serde(default)]
  pub questions:        Vec<NewQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
  pub prompt:        String,
  #[serde(default)]
  pub help_text:     Option<String>,
  pub question_type: QuestionType,
  #[serde(default)]
  pub required:      bool,
  #[serde(default)]
  pub rating_max:    Option<u8>,
  /// Choice labels in presentation order.
  #[serde(default)]
  pub choices:       Vec<String>,
}

fn default_status() -> SurveyStatus { SurveyStatus::Draft }

fn default_channels() -> Vec<Channel> { vec![Channel::Email] }

impl NewQuestion {
  pub fn new(prompt: impl Into<String>, question_type: QuestionType) -> Self {
    Self {
      prompt: prompt.into(),
      help_text: None,
      question_type,
      required: false,
      rating_max: None,
      choices: Vec::new(),
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn with_choices<I, T>(mut self, labels: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.choices = labels.into_iter().map(Into::into).collect();
    self
  }
}

impl NewSurvey {
  /// Structural checks applied before anything is persisted.
  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::InvalidDefinition("title must not be empty".into()));
    }
    if self.window.ends_at <= self.window.starts_at {
      return Err(Error::InvalidDefinition(
        "survey window must end after it starts".into(),
      ));
    }
    template::check_all(&self.templates)
      .map_err(|e| Error::InvalidDefinition(format!("invalid message template: {e}")))?;
    for (i, q) in self.questions.iter().enumerate() {
      if q.prompt.trim().is_empty() {
        return Err(Error::InvalidDefinition(format!(
          "question {} has an empty prompt",
          i + 1
        )));
      }
      if !q.question_type.is_choice() && !q.choices.is_empty() {
        return Err(Error::InvalidDefinition(format!(
          "question {} is {} and cannot carry choices",
          i + 1,
          q.question_type
        )));
      }
      if q.rating_max == Some(0) {
        return Err(Error::InvalidDefinition(format!(
          "question {} has a zero rating scale",
          i + 1
        )));
      }
    }
    Ok(())
  }
}
