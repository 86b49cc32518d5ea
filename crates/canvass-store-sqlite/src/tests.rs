//! Integration tests for `SqliteStore` against an in-memory database,
//! including the dispatch, intake and analytics flows that run on top of it.

use std::{sync::Arc, time::Duration as StdDuration};

use canvass_channels::MemoryAdapter;
use canvass_core::{
  Error as CoreError,
  analytics::{AnalyticsAggregator, AnalyticsOptions, QuestionSummary},
  answer::{AnswerValue, CompletedSubmission, CompletionOutcome, NewAnswer, Response, Submission},
  channel::{Adapters, Channel, ChannelAdapter, DeliveryError},
  delivery::{DeliveryLogEntry, DeliveryOutcome},
  dispatch::{DispatchConfig, DispatchEngine},
  intake::{Intake, Rejection},
  invitation::{Invitation, InvitationStatus},
  issuer::{MAX_TOKEN_ATTEMPTS, issue, issue_with},
  recipient::{NewRecipient, Recipient},
  store::{InsertInvitation, SurveyStore},
  survey::{
    CounterDelta, MessageTemplates, NewQuestion, NewSurvey, QuestionType, Survey,
    SurveyDefinition, SurveyStatus, SurveyWindow,
  },
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn open_window() -> SurveyWindow {
  let now = Utc::now();
  SurveyWindow { starts_at: now - Duration::days(1), ends_at: now + Duration::days(7) }
}

fn new_survey(status: SurveyStatus, window: SurveyWindow) -> NewSurvey {
  NewSurvey {
    title: "Graduate outcomes".into(),
    description: "Where are you now?".into(),
    status,
    window,
    templates: MessageTemplates::default(),
    default_channels: vec![Channel::Email],
    questions: vec![
      NewQuestion::new("Current status", QuestionType::SingleChoice)
        .required()
        .with_choices(["A", "B", "C"]),
      NewQuestion::new("Rate the program", QuestionType::Rating).required(),
      NewQuestion::new("Comments", QuestionType::LongText),
    ],
  }
}

async fn active_survey(s: &SqliteStore) -> SurveyDefinition {
  s.create_survey(new_survey(SurveyStatus::Active, open_window()))
    .await
    .unwrap()
}

async fn recipient(s: &SqliteStore, name: &str, email: Option<&str>) -> Recipient {
  s.add_recipient(NewRecipient {
    full_name: name.into(),
    email:     email.map(str::to_owned),
    phone:     None,
  })
  .await
  .unwrap()
}

fn engine(
  s: &Arc<SqliteStore>,
  adapter: &MemoryAdapter,
) -> DispatchEngine<SqliteStore, MemoryAdapter> {
  DispatchEngine::new(
    Arc::clone(s),
    Adapters::new(Some(adapter.clone()), Some(adapter.clone())),
    DispatchConfig {
      base_url: "https://alumni.example.org".into(),
      ..Default::default()
    },
  )
}

fn full_submission(def: &SurveyDefinition) -> Submission {
  let b = def.questions[0].choices[1].choice_id;
  Submission::from([
    (def.questions[0].question_id, json!(b.to_string())),
    (def.questions[1].question_id, json!(4)),
    (def.questions[2].question_id, json!("great program")),
  ])
}

// ─── Survey definitions ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_load_definition() {
  let s = store().await;
  let created = active_survey(&s).await;

  let loaded = s
    .get_definition(created.survey.survey_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(loaded.survey.title, "Graduate outcomes");
  assert_eq!(loaded.survey.status, SurveyStatus::Active);
  assert_eq!(loaded.survey.default_channels, vec![Channel::Email]);
  assert_eq!(loaded.questions.len(), 3);
  assert_eq!(
    loaded.questions.iter().map(|q| q.position).collect::<Vec<_>>(),
    vec![1, 2, 3]
  );
  assert_eq!(
    loaded.questions[0]
      .choices
      .iter()
      .map(|c| c.label.as_str())
      .collect::<Vec<_>>(),
    vec!["A", "B", "C"]
  );
  assert_eq!(loaded.questions[0].choices, created.questions[0].choices);
  assert!(loaded.questions[2].choices.is_empty());
}

#[tokio::test]
async fn invalid_definition_is_not_persisted() {
  let s = store().await;
  let mut input = new_survey(SurveyStatus::Draft, open_window());
  input.title = "  ".into();

  let err = s.create_survey(input).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(CoreError::InvalidDefinition(_))
  ));
}

#[tokio::test]
async fn status_changes_are_persisted() {
  let s = store().await;
  let def = active_survey(&s).await;

  let closed = s
    .set_survey_status(def.survey.survey_id, SurveyStatus::Closed)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(closed.status, SurveyStatus::Closed);
  assert!(
    s.set_survey_status(Uuid::new_v4(), SurveyStatus::Active)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn get_missing_records_returns_none() {
  let s = store().await;
  assert!(s.get_survey(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_definition(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_recipient(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Issuance ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issuing_twice_reuses_the_invitation() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;

  let first = issue(s.as_ref(), def.survey.survey_id, r.recipient_id)
    .await
    .unwrap();
  let second = issue(s.as_ref(), def.survey.survey_id, r.recipient_id)
    .await
    .unwrap();

  assert!(first.created);
  assert!(!second.created);
  assert_eq!(first.invitation.token, second.invitation.token);
  assert_eq!(first.invitation.status, InvitationStatus::Pending);
  assert_eq!(s.list_invitations(def.survey.survey_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn token_collisions_draw_again() {
  let s = store().await;
  let def = active_survey(&s).await;
  let a = recipient(&s, "A", None).await;
  let b = recipient(&s, "B", None).await;

  issue_with(s.as_ref(), def.survey.survey_id, a.recipient_id, || "taken".to_owned())
    .await
    .unwrap();

  let mut draws = ["taken", "taken", "fresh"].into_iter();
  let issued = issue_with(s.as_ref(), def.survey.survey_id, b.recipient_id, || {
    draws.next().unwrap_or("never").to_owned()
  })
  .await
  .unwrap();
  assert_eq!(issued.invitation.token, "fresh");
}

#[tokio::test]
async fn exhausted_token_draws_fail_loudly() {
  let s = store().await;
  let def = active_survey(&s).await;
  let a = recipient(&s, "A", None).await;
  let b = recipient(&s, "B", None).await;

  issue_with(s.as_ref(), def.survey.survey_id, a.recipient_id, || "same".to_owned())
    .await
    .unwrap();
  let err = issue_with(s.as_ref(), def.survey.survey_id, b.recipient_id, || "same".to_owned())
    .await
    .unwrap_err();

  assert!(matches!(err, CoreError::TokenExhausted(n) if n == MAX_TOKEN_ATTEMPTS));
  assert!(
    s.find_invitation(def.survey.survey_id, b.recipient_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn uniqueness_violations_are_outcomes() {
  let s = store().await;
  let def = active_survey(&s).await;
  let a = recipient(&s, "A", None).await;
  let b = recipient(&s, "B", None).await;
  let survey_id = def.survey.survey_id;

  let first = Invitation::pending(survey_id, a.recipient_id, "tok-1".into(), Utc::now());
  assert!(matches!(
    s.insert_invitation(first).await.unwrap(),
    InsertInvitation::Inserted(_)
  ));

  let same_pair = Invitation::pending(survey_id, a.recipient_id, "tok-2".into(), Utc::now());
  assert!(matches!(
    s.insert_invitation(same_pair).await.unwrap(),
    InsertInvitation::PairExists
  ));

  let same_token = Invitation::pending(survey_id, b.recipient_id, "tok-1".into(), Utc::now());
  assert!(matches!(
    s.insert_invitation(same_token).await.unwrap(),
    InsertInvitation::TokenTaken
  ));

  assert!(s.token_exists("tok-1").await.unwrap());
  assert!(!s.token_exists("tok-2").await.unwrap());
}

#[tokio::test]
async fn transitions_only_move_forward() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "A", None).await;
  let inv = issue(s.as_ref(), def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .invitation;
  let now = Utc::now();

  let opened = s
    .transition_invitation(inv.invitation_id, InvitationStatus::Opened, now)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(opened.status, InvitationStatus::Opened);
  assert!(opened.opened_at.is_some());
  assert!(opened.sent_at.is_none());

  for backwards in [InvitationStatus::Sent, InvitationStatus::Pending, InvitationStatus::Failed] {
    assert!(
      s.transition_invitation(inv.invitation_id, backwards, now)
        .await
        .unwrap()
        .is_none(),
      "{backwards}"
    );
  }

  let current = s.find_invitation_by_token(&inv.token).await.unwrap().unwrap();
  assert_eq!(current.status, InvitationStatus::Opened);
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dispatch_continues_past_failures() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let ok = recipient(&s, "Omar", Some("omar@example.com")).await;
  let bounced = recipient(&s, "Lina", Some("lina@example.com")).await;
  let no_address = recipient(&s, "Sami", None).await;
  let unknown = Uuid::new_v4();

  let adapter = MemoryAdapter::new().failing_for("lina@example.com");
  let report = engine(&s, &adapter)
    .dispatch(
      survey_id,
      &[ok.recipient_id, bounced.recipient_id, no_address.recipient_id, unknown],
      &[],
    )
    .await
    .unwrap();

  assert_eq!(report.succeeded, 1);
  assert_eq!(report.failed, 3);
  assert_eq!(report.tally(Channel::Email).sent, 1);
  assert_eq!(report.tally(Channel::Email).failed, 2);
  assert!(
    report
      .failures
      .iter()
      .any(|f| f.recipient_id == unknown && f.channel.is_none())
  );

  let sent = adapter.sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].destination, "omar@example.com");
  assert_eq!(sent[0].subject.as_deref(), Some("Survey: Graduate outcomes"));
  assert!(sent[0].body.contains("Dear Omar"));
  assert!(
    sent[0]
      .body
      .contains(&format!("https://alumni.example.org/surveys/{survey_id}/take?token="))
  );

  let log = s.list_deliveries(survey_id).await.unwrap();
  assert_eq!(log.len(), 3);
  assert_eq!(
    log.iter().filter(|e| e.outcome == DeliveryOutcome::Failed).count(),
    2
  );

  let status_of = |id: Uuid, invs: &[Invitation]| {
    invs.iter().find(|i| i.recipient_id == id).map(|i| i.status)
  };
  let invs = s.list_invitations(survey_id).await.unwrap();
  assert_eq!(status_of(ok.recipient_id, &invs), Some(InvitationStatus::Sent));
  assert_eq!(status_of(bounced.recipient_id, &invs), Some(InvitationStatus::Failed));
  assert_eq!(status_of(no_address.recipient_id, &invs), Some(InvitationStatus::Failed));

  let counters = s.get_survey(survey_id).await.unwrap().unwrap().counters;
  assert_eq!(counters.total_sent, 3);
  assert_eq!(counters.email_sent, 1);
  assert_eq!(counters.messaging_sent, 0);
}

#[tokio::test]
async fn one_successful_channel_marks_sent() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;
  let adapter = MemoryAdapter::new();

  let report = engine(&s, &adapter)
    .dispatch(def.survey.survey_id, &[r.recipient_id], &[
      Channel::Email,
      Channel::Messaging,
    ])
    .await
    .unwrap();

  assert_eq!(report.succeeded, 1);
  assert_eq!(report.tally(Channel::Messaging).failed, 1);
  let inv = s
    .find_invitation(def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inv.status, InvitationStatus::Sent);
  assert!(inv.sent_at.is_some());
}

#[tokio::test]
async fn redispatch_skips_failed_and_does_not_recount() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let ok = recipient(&s, "Omar", Some("omar@example.com")).await;
  let none = recipient(&s, "Sami", None).await;
  let adapter = MemoryAdapter::new();
  let engine = engine(&s, &adapter);

  engine
    .dispatch(survey_id, &[ok.recipient_id, none.recipient_id], &[])
    .await
    .unwrap();
  let again = engine
    .dispatch(survey_id, &[ok.recipient_id, none.recipient_id], &[])
    .await
    .unwrap();

  assert_eq!(again.succeeded, 1);
  assert_eq!(again.skipped.len(), 1);
  assert_eq!(again.skipped[0].recipient_id, none.recipient_id);
  assert_eq!(adapter.sent().len(), 2);

  let counters = s.get_survey(survey_id).await.unwrap().unwrap().counters;
  assert_eq!(counters.total_sent, 2);
  assert_eq!(counters.email_sent, 2);
}

#[tokio::test]
async fn closed_or_missing_survey_is_refused_before_any_write() {
  let s = store().await;
  let def = s
    .create_survey(new_survey(SurveyStatus::Closed, open_window()))
    .await
    .unwrap();
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;
  let adapter = MemoryAdapter::new();
  let engine = engine(&s, &adapter);

  let err = engine
    .dispatch(def.survey.survey_id, &[r.recipient_id], &[])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::SurveyClosed(_)));

  let missing = Uuid::new_v4();
  let err = engine.dispatch(missing, &[r.recipient_id], &[]).await.unwrap_err();
  assert!(matches!(err, CoreError::SurveyNotFound(id) if id == missing));

  assert!(s.list_invitations(def.survey.survey_id).await.unwrap().is_empty());
  assert!(adapter.sent().is_empty());
}

#[tokio::test]
async fn single_choice_with_one_option_is_not_dispatchable() {
  let s = store().await;
  let mut input = new_survey(SurveyStatus::Active, open_window());
  input.questions[0].choices = vec!["Only".into()];
  let def = s.create_survey(input).await.unwrap();
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;

  let err = engine(&s, &MemoryAdapter::new())
    .dispatch(def.survey.survey_id, &[r.recipient_id], &[])
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidDefinition(_)));
}

#[tokio::test]
async fn failed_resend_keeps_a_delivered_invitation_usable() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;
  let engine = engine(&s, &MemoryAdapter::new());

  engine
    .dispatch(survey_id, &[r.recipient_id], &[Channel::Email])
    .await
    .unwrap();
  // No phone on file, so the messaging resend fails.
  let resend = engine
    .dispatch(survey_id, &[r.recipient_id], &[Channel::Messaging])
    .await
    .unwrap();
  assert_eq!(resend.succeeded, 0);
  assert_eq!(resend.failed, 1);
  assert_eq!(resend.tally(Channel::Messaging).failed, 1);

  let inv = s
    .find_invitation(survey_id, r.recipient_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inv.status, InvitationStatus::Sent);

  let opened = Intake::new(Arc::clone(&s)).resolve(&inv.token).await.unwrap();
  assert_eq!(opened.invitation.status, InvitationStatus::Opened);
}

/// Never answers for `stall_for`; delivers everything else.
#[derive(Clone)]
struct StallingAdapter {
  stall_for: &'static str,
  inner:     MemoryAdapter,
}

impl ChannelAdapter for StallingAdapter {
  async fn send(
    &self,
    destination: &str,
    subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    if destination == self.stall_for {
      tokio::time::sleep(StdDuration::from_secs(30)).await;
    }
    self.inner.send(destination, subject, body).await
  }
}

#[tokio::test]
async fn slow_adapter_times_out_and_batch_continues() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let slow = recipient(&s, "Lina", Some("lina@example.com")).await;
  let ok = recipient(&s, "Omar", Some("omar@example.com")).await;

  let inner = MemoryAdapter::new();
  let adapter = StallingAdapter { stall_for: "lina@example.com", inner: inner.clone() };
  let send_timeout = StdDuration::from_millis(50);
  let engine = DispatchEngine::new(
    Arc::clone(&s),
    Adapters::new(Some(adapter), None),
    DispatchConfig { send_timeout, ..Default::default() },
  );

  let report = engine
    .dispatch(survey_id, &[slow.recipient_id, ok.recipient_id], &[Channel::Email])
    .await
    .unwrap();

  let expected = DeliveryError::Timeout(send_timeout).to_string();
  assert_eq!(report.succeeded, 1);
  assert_eq!(report.failed, 1);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].recipient_id, slow.recipient_id);
  assert_eq!(report.failures[0].channel, Some(Channel::Email));
  assert_eq!(report.failures[0].reason, expected);
  assert_eq!(inner.sent().len(), 1);
  assert_eq!(inner.sent()[0].destination, "omar@example.com");

  let log = s.list_deliveries(survey_id).await.unwrap();
  let timed_out = log
    .iter()
    .find(|e| e.recipient_id == slow.recipient_id)
    .unwrap();
  assert_eq!(timed_out.outcome, DeliveryOutcome::Failed);
  assert_eq!(timed_out.error.as_deref(), Some(expected.as_str()));

  let status_of = |id: Uuid, invs: &[Invitation]| {
    invs.iter().find(|i| i.recipient_id == id).map(|i| i.status)
  };
  let invs = s.list_invitations(survey_id).await.unwrap();
  assert_eq!(status_of(slow.recipient_id, &invs), Some(InvitationStatus::Failed));
  assert_eq!(status_of(ok.recipient_id, &invs), Some(InvitationStatus::Sent));
}

/// A store whose invitation transitions always fail.
struct FrozenTransitions(Arc<SqliteStore>);

impl SurveyStore for FrozenTransitions {
  type Error = crate::Error;

  async fn create_survey(&self, input: NewSurvey) -> crate::Result<SurveyDefinition> {
    self.0.create_survey(input).await
  }

  async fn get_survey(&self, survey_id: Uuid) -> crate::Result<Option<Survey>> {
    self.0.get_survey(survey_id).await
  }

  async fn get_definition(&self, survey_id: Uuid) -> crate::Result<Option<SurveyDefinition>> {
    self.0.get_definition(survey_id).await
  }

  async fn set_survey_status(
    &self,
    survey_id: Uuid,
    status: SurveyStatus,
  ) -> crate::Result<Option<Survey>> {
    self.0.set_survey_status(survey_id, status).await
  }

  async fn increment_counters(&self, survey_id: Uuid, delta: CounterDelta) -> crate::Result<()> {
    self.0.increment_counters(survey_id, delta).await
  }

  async fn add_recipient(&self, input: NewRecipient) -> crate::Result<Recipient> {
    self.0.add_recipient(input).await
  }

  async fn get_recipient(&self, recipient_id: Uuid) -> crate::Result<Option<Recipient>> {
    self.0.get_recipient(recipient_id).await
  }

  async fn find_invitation(
    &self,
    survey_id: Uuid,
    recipient_id: Uuid,
  ) -> crate::Result<Option<Invitation>> {
    self.0.find_invitation(survey_id, recipient_id).await
  }

  async fn find_invitation_by_token(&self, token: &str) -> crate::Result<Option<Invitation>> {
    self.0.find_invitation_by_token(token).await
  }

  async fn token_exists(&self, token: &str) -> crate::Result<bool> {
    self.0.token_exists(token).await
  }

  async fn insert_invitation(&self, invitation: Invitation) -> crate::Result<InsertInvitation> {
    self.0.insert_invitation(invitation).await
  }

  async fn transition_invitation(
    &self,
    _invitation_id: Uuid,
    next: InvitationStatus,
    _at: DateTime<Utc>,
  ) -> crate::Result<Option<Invitation>> {
    Err(crate::Error::Decode(format!("transition to {next} refused")))
  }

  async fn list_invitations(&self, survey_id: Uuid) -> crate::Result<Vec<Invitation>> {
    self.0.list_invitations(survey_id).await
  }

  async fn append_delivery(&self, entry: DeliveryLogEntry) -> crate::Result<()> {
    self.0.append_delivery(entry).await
  }

  async fn list_deliveries(&self, survey_id: Uuid) -> crate::Result<Vec<DeliveryLogEntry>> {
    self.0.list_deliveries(survey_id).await
  }

  async fn complete_invitation(
    &self,
    submission: CompletedSubmission,
  ) -> crate::Result<CompletionOutcome> {
    self.0.complete_invitation(submission).await
  }

  async fn list_responses(&self, survey_id: Uuid) -> crate::Result<Vec<Response>> {
    self.0.list_responses(survey_id).await
  }
}

#[tokio::test]
async fn store_error_after_delivery_counts_the_recipient_once() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;
  let adapter = MemoryAdapter::new();
  let engine = DispatchEngine::new(
    Arc::new(FrozenTransitions(Arc::clone(&s))),
    Adapters::new(Some(adapter.clone()), None),
    DispatchConfig::default(),
  );

  let report = engine
    .dispatch(survey_id, &[r.recipient_id], &[Channel::Email])
    .await
    .unwrap();

  assert_eq!(report.succeeded, 0);
  assert_eq!(report.failed, 1);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].channel, None);
  assert!(report.failures[0].reason.contains("refused"));
  // The message itself went out and is still tallied per channel.
  assert_eq!(report.tally(Channel::Email).sent, 1);
  assert_eq!(adapter.sent().len(), 1);
}

// ─── Intake ──────────────────────────────────────────────────────────────────

async fn issued_token(s: &SqliteStore, def: &SurveyDefinition) -> String {
  let r = recipient(s, "Omar", Some("omar@example.com")).await;
  issue(s, def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .invitation
    .token
}

#[tokio::test]
async fn resolve_opens_once_and_never_regresses() {
  let s = store().await;
  let def = active_survey(&s).await;
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));

  let first = intake.resolve(&token).await.unwrap();
  assert_eq!(first.invitation.status, InvitationStatus::Opened);
  assert_eq!(first.form().len(), 3);

  let second = intake.resolve(&token).await.unwrap();
  assert_eq!(second.invitation.status, InvitationStatus::Opened);
  assert_eq!(second.invitation.opened_at, first.invitation.opened_at);
}

#[tokio::test]
async fn accept_records_exactly_one_response() {
  let s = store().await;
  let def = active_survey(&s).await;
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));
  let submission = full_submission(&def);

  let response = intake.accept(&token, &submission).await.unwrap();
  assert!(response.is_complete);
  assert_eq!(response.answers.len(), 3);

  let again = intake.accept(&token, &submission).await.unwrap_err();
  assert!(matches!(again, CoreError::Rejected(Rejection::AlreadyCompleted)));
  let resolved = intake.resolve(&token).await.unwrap_err();
  assert!(matches!(resolved, CoreError::Rejected(Rejection::AlreadyCompleted)));

  let responses = s.list_responses(def.survey.survey_id).await.unwrap();
  assert_eq!(responses.len(), 1);
  assert_eq!(responses[0].answers.len(), 3);
  assert_eq!(
    responses[0]
      .answer_for(def.questions[2].question_id)
      .map(|a| a.value.clone()),
    Some(AnswerValue::Text("great program".into()))
  );

  let survey = s.get_survey(def.survey.survey_id).await.unwrap().unwrap();
  assert_eq!(survey.counters.responses_received, 1);
  let inv = s.find_invitation_by_token(&token).await.unwrap().unwrap();
  assert_eq!(inv.status, InvitationStatus::Completed);
  assert!(inv.completed_at.is_some());
}

#[tokio::test]
async fn concurrent_submissions_yield_one_response() {
  let s = store().await;
  let def = active_survey(&s).await;
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));
  let submission = full_submission(&def);

  let (a, b) = tokio::join!(
    intake.accept(&token, &submission),
    intake.accept(&token, &submission)
  );
  assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
  assert_eq!(s.list_responses(def.survey.survey_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn completing_a_non_opened_invitation_writes_nothing() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "Omar", None).await;
  let inv = issue(s.as_ref(), def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .invitation;

  let outcome = s
    .complete_invitation(CompletedSubmission {
      invitation_id: inv.invitation_id,
      survey_id:     def.survey.survey_id,
      recipient_id:  r.recipient_id,
      submitted_at:  Utc::now(),
      answers:       vec![
        NewAnswer::new(&def.questions[1], AnswerValue::Number(3.0)).unwrap(),
      ],
    })
    .await
    .unwrap();

  assert!(matches!(outcome, CompletionOutcome::AlreadyCompleted));
  assert!(s.list_responses(def.survey.survey_id).await.unwrap().is_empty());
  let survey = s.get_survey(def.survey.survey_id).await.unwrap().unwrap();
  assert_eq!(survey.counters.responses_received, 0);
}

#[tokio::test]
async fn missing_required_answers_are_rejected_without_writes() {
  let s = store().await;
  let def = active_survey(&s).await;
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));

  let partial = Submission::from([(def.questions[2].question_id, json!("only comments"))]);
  let err = intake.accept(&token, &partial).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Rejected(Rejection::MissingRequired { ref question_ids }) if question_ids.len() == 2
  ));
  assert!(s.list_responses(def.survey.survey_id).await.unwrap().is_empty());

  // The token still takes a corrected submission.
  assert!(intake.accept(&token, &full_submission(&def)).await.is_ok());
}

#[tokio::test]
async fn rejected_submission_leaves_the_invitation_unopened() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "Omar", Some("omar@example.com")).await;
  engine(&s, &MemoryAdapter::new())
    .dispatch(def.survey.survey_id, &[r.recipient_id], &[])
    .await
    .unwrap();
  let token = s
    .find_invitation(def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .unwrap()
    .token;
  let intake = Intake::new(Arc::clone(&s));

  let mut bad = full_submission(&def);
  bad.insert(def.questions[1].question_id, json!("five"));
  let err = intake.accept(&token, &bad).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Rejected(Rejection::InvalidAnswer { question_id, .. })
      if question_id == def.questions[1].question_id
  ));

  let inv = s.find_invitation_by_token(&token).await.unwrap().unwrap();
  assert_eq!(inv.status, InvitationStatus::Sent);
  assert!(inv.opened_at.is_none());
}

#[tokio::test]
async fn unknown_token_is_not_found_and_creates_nothing() {
  let s = store().await;
  let def = active_survey(&s).await;
  let intake = Intake::new(Arc::clone(&s));

  let err = intake.resolve("no-such-token").await.unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::NotFound)));
  let err = intake
    .accept("no-such-token", &full_submission(&def))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::NotFound)));

  assert!(s.list_invitations(def.survey.survey_id).await.unwrap().is_empty());
  assert!(s.list_responses(def.survey.survey_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn token_for_another_survey_is_not_found() {
  let s = store().await;
  let def = active_survey(&s).await;
  let other = active_survey(&s).await;
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));

  let err = intake
    .resolve_in(other.survey.survey_id, &token)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::NotFound)));

  let inv = s.find_invitation_by_token(&token).await.unwrap().unwrap();
  assert_eq!(inv.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn past_end_date_is_unavailable_regardless_of_status() {
  let s = store().await;
  let now = Utc::now();
  let def = s
    .create_survey(new_survey(SurveyStatus::Active, SurveyWindow {
      starts_at: now - Duration::days(10),
      ends_at:   now - Duration::days(1),
    }))
    .await
    .unwrap();
  let token = issued_token(&s, &def).await;
  let intake = Intake::new(Arc::clone(&s));

  let err = intake.resolve(&token).await.unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::Expired)));
  let inv = s.find_invitation_by_token(&token).await.unwrap().unwrap();
  assert_eq!(inv.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn draft_survey_is_not_active() {
  let s = store().await;
  let def = s
    .create_survey(new_survey(SurveyStatus::Draft, open_window()))
    .await
    .unwrap();
  let token = issued_token(&s, &def).await;

  let err = Intake::new(Arc::clone(&s)).resolve(&token).await.unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::NotActive)));
}

#[tokio::test]
async fn failed_invitation_token_is_not_found() {
  let s = store().await;
  let def = active_survey(&s).await;
  let r = recipient(&s, "Sami", None).await;
  engine(&s, &MemoryAdapter::new())
    .dispatch(def.survey.survey_id, &[r.recipient_id], &[])
    .await
    .unwrap();
  let inv = s
    .find_invitation(def.survey.survey_id, r.recipient_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(inv.status, InvitationStatus::Failed);

  let err = Intake::new(Arc::clone(&s)).resolve(&inv.token).await.unwrap_err();
  assert!(matches!(err, CoreError::Rejected(Rejection::NotFound)));
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn dispatch_respond_and_analyze() {
  let s = store().await;
  let def = active_survey(&s).await;
  let survey_id = def.survey.survey_id;
  let omar = recipient(&s, "Omar", Some("omar@example.com")).await;
  let lina = recipient(&s, "Lina", Some("lina@example.com")).await;

  let adapter = MemoryAdapter::new().failing_for("lina@example.com");
  let report = engine(&s, &adapter)
    .dispatch(survey_id, &[omar.recipient_id, lina.recipient_id], &[])
    .await
    .unwrap();
  assert_eq!(report.succeeded, 1);
  assert_eq!(report.failed, 1);

  let token = s
    .find_invitation(survey_id, omar.recipient_id)
    .await
    .unwrap()
    .unwrap()
    .token;
  let intake = Intake::new(Arc::clone(&s));
  intake.resolve(&token).await.unwrap();
  intake.accept(&token, &full_submission(&def)).await.unwrap();

  let stats = AnalyticsAggregator::new(Arc::clone(&s), AnalyticsOptions::default())
    .survey(survey_id)
    .await
    .unwrap();

  assert_eq!(stats.total_sent, 2);
  assert_eq!(stats.responses, 1);
  assert_eq!(stats.completion_rate, 0.5);
  assert_eq!(stats.completion_percentage, 50.0);

  let QuestionSummary::Choice { tally, .. } = &stats.questions[0].summary else {
    panic!("expected a choice summary");
  };
  assert_eq!(
    tally.iter().map(|t| (t.label.as_str(), t.count)).collect::<Vec<_>>(),
    vec![("A", 0), ("B", 1), ("C", 0)]
  );
  assert!(matches!(
    stats.questions[1].summary,
    QuestionSummary::Numeric { mean, .. } if mean == 4.0
  ));
  assert!(matches!(
    &stats.questions[2].summary,
    QuestionSummary::Text { sample, .. } if sample == &vec!["great program".to_owned()]
  ));
  assert_eq!(stats.timeline.len(), 7);
  assert_eq!(stats.timeline.last().map(|d| d.count), Some(1));
}

#[tokio::test]
async fn analytics_for_missing_survey_is_an_error() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = AnalyticsAggregator::new(Arc::clone(&s), AnalyticsOptions::default())
    .survey(missing)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::SurveyNotFound(id) if id == missing));
}
