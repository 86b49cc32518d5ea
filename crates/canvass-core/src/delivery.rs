//! Delivery log: an append-only audit record of every dispatch attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;

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
pub enum DeliveryOutcome {
  Sent,
  Failed,
}

/// One attempt to deliver one invitation over one channel. Never updated;
/// retries append new entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
  pub entry_id:     Uuid,
  pub survey_id:    Uuid,
  pub recipient_id: Uuid,
  pub channel:      Channel,
  pub outcome:      DeliveryOutcome,
  pub error:        Option<String>,
  pub attempted_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
  pub fn sent(survey_id: Uuid, recipient_id: Uuid, channel: Channel) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      survey_id,
      recipient_id,
      channel,
      outcome: DeliveryOutcome::Sent,
      error: None,
      attempted_at: Utc::now(),
    }
  }

  pub fn failed(
    survey_id: Uuid,
    recipient_id: Uuid,
    channel: Channel,
    error: impl Into<String>,
  ) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      survey_id,
      recipient_id,
      channel,
      outcome: DeliveryOutcome::Failed,
      error: Some(error.into()),
      attempted_at: Utc::now(),
    }
  }
}
