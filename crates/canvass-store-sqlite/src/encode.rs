//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order in SQL matches chronological order. Enums are stored
//! by their lowercase names; templates and channel sets as compact JSON.

use std::{fmt::Display, str::FromStr};

use canvass_core::{
  answer::{Answer, AnswerValue, Response},
  channel::Channel,
  delivery::DeliveryLogEntry,
  invitation::Invitation,
  recipient::Recipient,
  survey::{Choice, MessageTemplates, Question, Survey, SurveyCounters, SurveyWindow},
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse a strum-backed enum column.
pub fn decode_enum<T>(column: &str, s: &str) -> Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  s.parse()
    .map_err(|e| Error::Decode(format!("{column} {s:?}: {e}")))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_templates(t: &MessageTemplates) -> Result<String> { Ok(serde_json::to_string(t)?) }

pub fn encode_channels(c: &[Channel]) -> Result<String> { Ok(serde_json::to_string(c)?) }

/// Split an answer into its `kind` discriminant and JSON payload.
pub fn encode_answer(value: &AnswerValue) -> Result<(String, String)> {
  Ok((value.discriminant().to_owned(), value.to_json()?.to_string()))
}

/// SQLite integers are signed; counters never go negative.
pub fn decode_count(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SURVEY_COLUMNS: &str = "survey_id, title, description, status, starts_at, ends_at,
   templates, default_channels, total_sent, email_sent, messaging_sent,
   responses_received, created_at";

/// Raw values read directly from a `surveys` row.
pub struct RawSurvey {
  pub survey_id:          String,
  pub title:              String,
  pub description:        String,
  pub status:             String,
  pub starts_at:          String,
  pub ends_at:            String,
  pub templates:          String,
  pub default_channels:   String,
  pub total_sent:         i64,
  pub email_sent:         i64,
  pub messaging_sent:     i64,
  pub responses_received: i64,
  pub created_at:         String,
}

impl RawSurvey {
  /// Map a row selected with [`SURVEY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      survey_id:          row.get(0)?,
      title:              row.get(1)?,
      description:        row.get(2)?,
      status:             row.get(3)?,
      starts_at:          row.get(4)?,
      ends_at:            row.get(5)?,
      templates:          row.get(6)?,
      default_channels:   row.get(7)?,
      total_sent:         row.get(8)?,
      email_sent:         row.get(9)?,
      messaging_sent:     row.get(10)?,
      responses_received: row.get(11)?,
      created_at:         row.get(12)?,
    })
  }

  pub fn into_survey(self) -> Result<Survey> {
    Ok(Survey {
      survey_id:        decode_uuid(&self.survey_id)?,
      title:            self.title,
      description:      self.description,
      status:           decode_enum("survey status", &self.status)?,
      window:           SurveyWindow {
        starts_at: decode_dt(&self.starts_at)?,
        ends_at:   decode_dt(&self.ends_at)?,
      },
      templates:        serde_json::from_str(&self.templates)?,
      default_channels: serde_json::from_str(&self.default_channels)?,
      counters:         SurveyCounters {
        total_sent:         decode_count(self.total_sent),
        email_sent:         decode_count(self.email_sent),
        messaging_sent:     decode_count(self.messaging_sent),
        responses_received: decode_count(self.responses_received),
      },
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `questions` row.
pub struct RawQuestion {
  pub question_id:   String,
  pub survey_id:     String,
  pub position:      u32,
  pub prompt:        String,
  pub help_text:     Option<String>,
  pub question_type: String,
  pub required:      bool,
  pub rating_max:    Option<u8>,
}

impl RawQuestion {
  /// Choices are attached afterwards.
  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id:   decode_uuid(&self.question_id)?,
      survey_id:     decode_uuid(&self.survey_id)?,
      position:      self.position,
      prompt:        self.prompt,
      help_text:     self.help_text,
      question_type: decode_enum("question type", &self.question_type)?,
      required:      self.required,
      rating_max:    self.rating_max,
      choices:       Vec::new(),
    })
  }
}

/// Raw values read directly from a `choices` row.
pub struct RawChoice {
  pub choice_id:   String,
  pub question_id: String,
  pub position:    u32,
  pub label:       String,
}

impl RawChoice {
  pub fn into_choice(self) -> Result<Choice> {
    Ok(Choice {
      choice_id:   decode_uuid(&self.choice_id)?,
      question_id: decode_uuid(&self.question_id)?,
      position:    self.position,
      label:       self.label,
    })
  }
}

/// Raw values read directly from a `recipients` row.
pub struct RawRecipient {
  pub recipient_id: String,
  pub full_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub created_at:   String,
}

impl RawRecipient {
  pub fn into_recipient(self) -> Result<Recipient> {
    Ok(Recipient {
      recipient_id: decode_uuid(&self.recipient_id)?,
      full_name:    self.full_name,
      email:        self.email,
      phone:        self.phone,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const INVITATION_COLUMNS: &str = "invitation_id, survey_id, recipient_id, token, status,
   created_at, sent_at, opened_at, completed_at";

/// Raw values read directly from an `invitations` row.
pub struct RawInvitation {
  pub invitation_id: String,
  pub survey_id:     String,
  pub recipient_id:  String,
  pub token:         String,
  pub status:        String,
  pub created_at:    String,
  pub sent_at:       Option<String>,
  pub opened_at:     Option<String>,
  pub completed_at:  Option<String>,
}

impl RawInvitation {
  /// Map a row selected with [`INVITATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invitation_id: row.get(0)?,
      survey_id:     row.get(1)?,
      recipient_id:  row.get(2)?,
      token:         row.get(3)?,
      status:        row.get(4)?,
      created_at:    row.get(5)?,
      sent_at:       row.get(6)?,
      opened_at:     row.get(7)?,
      completed_at:  row.get(8)?,
    })
  }

  pub fn into_invitation(self) -> Result<Invitation> {
    Ok(Invitation {
      invitation_id: decode_uuid(&self.invitation_id)?,
      survey_id:     decode_uuid(&self.survey_id)?,
      recipient_id:  decode_uuid(&self.recipient_id)?,
      token:         self.token,
      status:        decode_enum("invitation status", &self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      sent_at:       decode_opt_dt(self.sent_at)?,
      opened_at:     decode_opt_dt(self.opened_at)?,
      completed_at:  decode_opt_dt(self.completed_at)?,
    })
  }
}

/// Raw values read directly from a `delivery_log` row.
pub struct RawDelivery {
  pub entry_id:     String,
  pub survey_id:    String,
  pub recipient_id: String,
  pub channel:      String,
  pub outcome:      String,
  pub error:        Option<String>,
  pub attempted_at: String,
}

impl RawDelivery {
  pub fn into_entry(self) -> Result<DeliveryLogEntry> {
    Ok(DeliveryLogEntry {
      entry_id:     decode_uuid(&self.entry_id)?,
      survey_id:    decode_uuid(&self.survey_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      channel:      decode_enum("channel", &self.channel)?,
      outcome:      decode_enum("delivery outcome", &self.outcome)?,
      error:        self.error,
      attempted_at: decode_dt(&self.attempted_at)?,
    })
  }
}

/// Raw values read directly from a `responses` row. Answers are attached
/// afterwards.
pub struct RawResponse {
  pub response_id:   String,
  pub survey_id:     String,
  pub recipient_id:  String,
  pub invitation_id: String,
  pub is_complete:   bool,
  pub submitted_at:  String,
}

impl RawResponse {
  pub fn into_response(self, answers: Vec<Answer>) -> Result<Response> {
    Ok(Response {
      response_id: decode_uuid(&self.response_id)?,
      survey_id: decode_uuid(&self.survey_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      invitation_id: decode_uuid(&self.invitation_id)?,
      is_complete: self.is_complete,
      submitted_at: decode_dt(&self.submitted_at)?,
      answers,
    })
  }
}

/// Raw values read directly from an `answers` row.
pub struct RawAnswer {
  pub answer_id:   String,
  pub response_id: String,
  pub question_id: String,
  pub kind:        String,
  pub value_json:  String,
}

impl RawAnswer {
  pub fn into_answer(self) -> Result<Answer> {
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    Ok(Answer {
      answer_id:   decode_uuid(&self.answer_id)?,
      response_id: decode_uuid(&self.response_id)?,
      question_id: decode_uuid(&self.question_id)?,
      value:       AnswerValue::from_parts(&self.kind, data)?,
    })
  }
}
