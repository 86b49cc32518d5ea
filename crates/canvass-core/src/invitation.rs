//! Invitations, one per (survey, recipient), carrying the access token.
//!
//! Status moves strictly forward:
//!
//! | From      | To                          |
//! |-----------|-----------------------------|
//! | `pending` | `sent`, `opened`, `failed`  |
//! | `sent`    | `opened`, `failed`          |
//! | `opened`  | `completed`                 |
//!
//! `failed` and `completed` are terminal.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bytes of OS entropy behind each token.
pub const TOKEN_BYTES: usize = 24;

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvitationStatus {
  Pending,
  Sent,
  Opened,
  Completed,
  Failed,
}

impl InvitationStatus {
  pub const ALL: [InvitationStatus; 5] = [
    Self::Pending,
    Self::Sent,
    Self::Opened,
    Self::Completed,
    Self::Failed,
  ];

  /// Whether `self → next` is a legal forward transition.
  pub fn can_transition_to(self, next: Self) -> bool {
    use InvitationStatus::*;
    matches!(
      (self, next),
      (Pending, Sent | Opened | Failed) | (Sent, Opened | Failed) | (Opened, Completed)
    )
  }

  /// Every status from which `self` is reachable in one step.
  pub fn predecessors(self) -> Vec<Self> {
    Self::ALL
      .into_iter()
      .filter(|from| from.can_transition_to(self))
      .collect()
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
  pub invitation_id: Uuid,
  pub survey_id:     Uuid,
  pub recipient_id:  Uuid,
  /// Opaque bearer credential; globally unique.
  pub token:         String,
  pub status:        InvitationStatus,
  pub created_at:    DateTime<Utc>,
  pub sent_at:       Option<DateTime<Utc>>,
  pub opened_at:     Option<DateTime<Utc>>,
  pub completed_at:  Option<DateTime<Utc>>,
}

impl Invitation {
  /// A fresh `pending` invitation.
  pub fn pending(
    survey_id: Uuid,
    recipient_id: Uuid,
    token: String,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      invitation_id: Uuid::new_v4(),
      survey_id,
      recipient_id,
      token,
      status: InvitationStatus::Pending,
      created_at: now,
      sent_at: None,
      opened_at: None,
      completed_at: None,
    }
  }
}

/// Draw a new unguessable, URL-safe token from the OS CSPRNG.
pub fn generate_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}
