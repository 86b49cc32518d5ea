//! Recipient: the narrow view of an alumni record that dispatch needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Channel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
  pub recipient_id: Uuid,
  pub full_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub created_at:   DateTime<Utc>,
}

impl Recipient {
  /// The destination for `channel`, or `None` if no usable address is on
  /// file.
  pub fn address_for(&self, channel: Channel) -> Option<&str> {
    let raw = match channel {
      Channel::Email => self.email.as_deref(),
      Channel::Messaging => self.phone.as_deref(),
    };
    raw.map(str::trim).filter(|s| !s.is_empty())
  }
}

/// Input to [`crate::store::SurveyStore::add_recipient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipient {
  pub full_name: String,
  #[serde(default)]
  pub email:     Option<String>,
  #[serde(default)]
  pub phone:     Option<String>,
}

impl NewRecipient {
  pub fn with_email(full_name: impl Into<String>, email: impl Into<String>) -> Self {
    Self { full_name: full_name.into(), email: Some(email.into()), phone: None }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_addresses_are_missing() {
    let r = Recipient {
      recipient_id: Uuid::nil(),
      full_name:    "Layla Hassan".into(),
      email:        Some("  ".into()),
      phone:        Some(" 0501234567 ".into()),
      created_at:   Utc::now(),
    };
    assert_eq!(r.address_for(Channel::Email), None);
    assert_eq!(r.address_for(Channel::Messaging), Some("0501234567"));
  }
}
