//! Invitation issuer: one invitation per (survey, recipient).
//!
//! Issuing is idempotent: an existing invitation is returned unchanged, which
//! is what makes resending safe to repeat. New tokens are drawn until one is
//! free, bounded by [`MAX_TOKEN_ATTEMPTS`].

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  invitation::{Invitation, generate_token},
  store::{InsertInvitation, SurveyStore},
};

/// Upper bound on token draws before issuance gives up.
pub const MAX_TOKEN_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct Issued {
  pub invitation: Invitation,
  /// `true` if this call created the invitation.
  pub created:    bool,
}

/// Return the invitation for `(survey_id, recipient_id)`, creating a
/// `pending` one with a fresh token if none exists.
pub async fn issue<S>(store: &S, survey_id: Uuid, recipient_id: Uuid) -> Result<Issued>
where
  S: SurveyStore,
{
  issue_with(store, survey_id, recipient_id, generate_token).await
}

/// [`issue`] with a caller-supplied token source.
pub async fn issue_with<S, F>(
  store: &S,
  survey_id: Uuid,
  recipient_id: Uuid,
  mut draw: F,
) -> Result<Issued>
where
  S: SurveyStore,
  F: FnMut() -> String + Send,
{
  if let Some(invitation) = store
    .find_invitation(survey_id, recipient_id)
    .await
    .map_err(Error::store)?
  {
    return Ok(Issued { invitation, created: false });
  }

  for attempt in 1..=MAX_TOKEN_ATTEMPTS {
    let token = draw();
    if store.token_exists(&token).await.map_err(Error::store)? {
      debug!(attempt, "token already in use, drawing again");
      continue;
    }

    let candidate = Invitation::pending(survey_id, recipient_id, token, Utc::now());
    match store
      .insert_invitation(candidate)
      .await
      .map_err(Error::store)?
    {
      InsertInvitation::Inserted(invitation) => {
        debug!(%survey_id, %recipient_id, "issued invitation");
        return Ok(Issued { invitation, created: true });
      }
      InsertInvitation::PairExists => {
        // A concurrent issuer won the race; reuse its invitation.
        let invitation = store
          .find_invitation(survey_id, recipient_id)
          .await
          .map_err(Error::store)?
          .ok_or(Error::InvitationVanished { survey_id, recipient_id })?;
        return Ok(Issued { invitation, created: false });
      }
      InsertInvitation::TokenTaken => {
        debug!(attempt, "token taken at insert, drawing again");
      }
    }
  }

  Err(Error::TokenExhausted(MAX_TOKEN_ATTEMPTS))
}
