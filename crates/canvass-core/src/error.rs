//! Error types for `canvass-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::intake::Rejection;

#[derive(Debug, Error)]
pub enum Error {
  #[error("survey not found: {0}")]
  SurveyNotFound(Uuid),

  #[error("recipient not found: {0}")]
  RecipientNotFound(Uuid),

  #[error("survey {0} is closed")]
  SurveyClosed(Uuid),

  #[error("invalid survey definition: {0}")]
  InvalidDefinition(String),

  #[error("no unique invitation token after {0} attempts")]
  TokenExhausted(usize),

  #[error("invitation for survey {survey_id} and recipient {recipient_id} vanished after a conflict")]
  InvitationVanished { survey_id: Uuid, recipient_id: Uuid },

  #[error("rejected: {0}")]
  Rejected(#[from] Rejection),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
