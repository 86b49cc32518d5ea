//! The `SurveyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `canvass-store-sqlite`).
//! The services in this crate and the HTTP layer depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  answer::{CompletedSubmission, CompletionOutcome, Response},
  delivery::DeliveryLogEntry,
  invitation::{Invitation, InvitationStatus},
  recipient::{NewRecipient, Recipient},
  survey::{CounterDelta, NewSurvey, Survey, SurveyDefinition, SurveyStatus},
};

/// Result of [`SurveyStore::insert_invitation`]. Uniqueness violations are
/// outcomes, not errors: the issuer resolves both locally.
#[derive(Debug, Clone)]
pub enum InsertInvitation {
  Inserted(Invitation),
  /// An invitation for the same (survey, recipient) pair already exists.
  PairExists,
  /// The token is already held by another invitation.
  TokenTaken,
}

/// Abstraction over a Canvass store backend.
///
/// Backends must enforce, at the storage level:
/// - one invitation per (survey, recipient) and globally unique tokens;
/// - forward-only invitation transitions (see [`InvitationStatus`]);
/// - additive counter updates;
/// - all-or-nothing [`complete_invitation`](Self::complete_invitation).
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Survey definitions ────────────────────────────────────────────────

  /// Persist a survey with its questions and choices in one step.
  fn create_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<SurveyDefinition, Self::Error>> + Send + '_;

  fn get_survey(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  /// The survey with its ordered questions and choices.
  fn get_definition(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Option<SurveyDefinition>, Self::Error>> + Send + '_;

  /// Returns the updated survey, or `None` if it does not exist.
  fn set_survey_status(
    &self,
    survey_id: Uuid,
    status: SurveyStatus,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  /// Add `delta` to the survey's counters in a single update.
  fn increment_counters(
    &self,
    survey_id: Uuid,
    delta: CounterDelta,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Recipients ────────────────────────────────────────────────────────

  fn add_recipient(
    &self,
    input: NewRecipient,
  ) -> impl Future<Output = Result<Recipient, Self::Error>> + Send + '_;

  fn get_recipient(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + '_;

  // ── Invitations ───────────────────────────────────────────────────────

  fn find_invitation(
    &self,
    survey_id: Uuid,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<Option<Invitation>, Self::Error>> + Send + '_;

  fn find_invitation_by_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Invitation>, Self::Error>> + Send + 'a;

  fn token_exists<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn insert_invitation(
    &self,
    invitation: Invitation,
  ) -> impl Future<Output = Result<InsertInvitation, Self::Error>> + Send + '_;

  /// Move an invitation to `next` and stamp the matching timestamp, but only
  /// if its current status is one of `next.predecessors()`.
  ///
  /// Returns the updated invitation, or `None` when the transition did not
  /// apply (unknown id, or the invitation was not in a predecessor state).
  fn transition_invitation(
    &self,
    invitation_id: Uuid,
    next: InvitationStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Invitation>, Self::Error>> + Send + '_;

  fn list_invitations(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Invitation>, Self::Error>> + Send + '_;

  // ── Delivery log (append-only) ───────────────────────────────────────

  fn append_delivery(
    &self,
    entry: DeliveryLogEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Entries for a survey, oldest first.
  fn list_deliveries(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DeliveryLogEntry>, Self::Error>> + Send + '_;

  // ── Responses ─────────────────────────────────────────────────────────

  /// Atomically move the invitation `opened → completed`, insert the
  /// response and all its answers, and bump `responses_received`.
  ///
  /// If the invitation is not `opened` nothing is written and
  /// [`CompletionOutcome::AlreadyCompleted`] is returned.
  fn complete_invitation(
    &self,
    submission: CompletedSubmission,
  ) -> impl Future<Output = Result<CompletionOutcome, Self::Error>> + Send + '_;

  /// Responses for a survey with their answers, oldest submission first.
  fn list_responses(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Response>, Self::Error>> + Send + '_;
}
