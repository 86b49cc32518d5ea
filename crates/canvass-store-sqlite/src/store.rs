//! [`SqliteStore`], the SQLite implementation of [`SurveyStore`].

use std::{collections::HashMap, path::Path};

use canvass_core::{
  answer::{Answer, CompletedSubmission, CompletionOutcome, Response},
  delivery::DeliveryLogEntry,
  invitation::{Invitation, InvitationStatus},
  recipient::{NewRecipient, Recipient},
  store::{InsertInvitation, SurveyStore},
  survey::{
    Choice, CounterDelta, NewSurvey, Question, Survey, SurveyCounters, SurveyDefinition,
    SurveyStatus,
  },
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    INVITATION_COLUMNS, RawAnswer, RawChoice, RawDelivery, RawInvitation, RawQuestion,
    RawRecipient, RawResponse, RawSurvey, SURVEY_COLUMNS, decode_uuid, encode_answer,
    encode_channels, encode_count, encode_dt, encode_templates, encode_uuid,
  },
  schema::SCHEMA,
};

/// Which uniqueness constraint an invitation insert tripped.
enum Conflict {
  Pair,
  Token,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Canvass survey store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Survey definitions ────────────────────────────────────────────────────

  async fn create_survey(&self, input: NewSurvey) -> Result<SurveyDefinition> {
    input.validate()?;

    let survey_id = Uuid::new_v4();
    let survey = Survey {
      survey_id,
      title: input.title,
      description: input.description,
      status: input.status,
      window: input.window,
      templates: input.templates,
      default_channels: input.default_channels,
      counters: SurveyCounters::default(),
      created_at: Utc::now(),
    };

    let questions: Vec<Question> = input
      .questions
      .into_iter()
      .zip(1..)
      .map(|(q, position)| {
        let question_id = Uuid::new_v4();
        Question {
          question_id,
          survey_id,
          position,
          prompt: q.prompt,
          help_text: q.help_text,
          question_type: q.question_type,
          required: q.required,
          rating_max: q.rating_max,
          choices: q
            .choices
            .into_iter()
            .zip(1..)
            .map(|(label, position)| Choice {
              choice_id: Uuid::new_v4(),
              question_id,
              position,
              label,
            })
            .collect(),
        }
      })
      .collect();

    let survey_row = (
      encode_uuid(survey_id),
      survey.title.clone(),
      survey.description.clone(),
      survey.status.to_string(),
      encode_dt(survey.window.starts_at),
      encode_dt(survey.window.ends_at),
      encode_templates(&survey.templates)?,
      encode_channels(&survey.default_channels)?,
      encode_dt(survey.created_at),
    );
    let question_rows: Vec<_> = questions
      .iter()
      .map(|q| {
        (
          encode_uuid(q.question_id),
          q.position,
          q.prompt.clone(),
          q.help_text.clone(),
          q.question_type.to_string(),
          q.required,
          q.rating_max,
        )
      })
      .collect();
    let choice_rows: Vec<_> = questions
      .iter()
      .flat_map(|q| &q.choices)
      .map(|c| {
        (
          encode_uuid(c.choice_id),
          encode_uuid(c.question_id),
          c.position,
          c.label.clone(),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO surveys (
             survey_id, title, description, status, starts_at, ends_at,
             templates, default_channels, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            survey_row.0,
            survey_row.1,
            survey_row.2,
            survey_row.3,
            survey_row.4,
            survey_row.5,
            survey_row.6,
            survey_row.7,
            survey_row.8,
          ],
        )?;
        for (id, position, prompt, help_text, question_type, required, rating_max) in
          &question_rows
        {
          tx.execute(
            "INSERT INTO questions (
               question_id, survey_id, position, prompt, help_text,
               question_type, required, rating_max
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
              id,
              survey_row.0,
              position,
              prompt,
              help_text,
              question_type,
              required,
              rating_max,
            ],
          )?;
        }
        for (id, question_id, position, label) in &choice_rows {
          tx.execute(
            "INSERT INTO choices (choice_id, question_id, position, label)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, question_id, position, label],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(SurveyDefinition { survey, questions })
  }

  async fn get_survey(&self, survey_id: Uuid) -> Result<Option<Survey>> {
    let id_str = encode_uuid(survey_id);

    let raw: Option<RawSurvey> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            RawSurvey::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSurvey::into_survey).transpose()
  }

  async fn get_definition(&self, survey_id: Uuid) -> Result<Option<SurveyDefinition>> {
    let id_str = encode_uuid(survey_id);

    let raw = self
      .conn
      .call(move |conn| {
        let survey = conn
          .query_row(
            &format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_id = ?1"),
            rusqlite::params![id_str],
            RawSurvey::from_row,
          )
          .optional()?;
        let Some(survey) = survey else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT question_id, survey_id, position, prompt, help_text,
                  question_type, required, rating_max
           FROM questions
           WHERE survey_id = ?1
           ORDER BY position",
        )?;
        let questions = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawQuestion {
              question_id:   row.get(0)?,
              survey_id:     row.get(1)?,
              position:      row.get(2)?,
              prompt:        row.get(3)?,
              help_text:     row.get(4)?,
              question_type: row.get(5)?,
              required:      row.get(6)?,
              rating_max:    row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT c.choice_id, c.question_id, c.position, c.label
           FROM choices c
           JOIN questions q ON q.question_id = c.question_id
           WHERE q.survey_id = ?1
           ORDER BY q.position, c.position",
        )?;
        let choices = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawChoice {
              choice_id:   row.get(0)?,
              question_id: row.get(1)?,
              position:    row.get(2)?,
              label:       row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((survey, questions, choices)))
      })
      .await?;

    let Some((survey, questions, choices)) = raw else {
      return Ok(None);
    };

    let survey = survey.into_survey()?;
    let mut questions: Vec<Question> = questions
      .into_iter()
      .map(RawQuestion::into_question)
      .collect::<Result<_>>()?;
    let index: HashMap<Uuid, usize> = questions
      .iter()
      .enumerate()
      .map(|(i, q)| (q.question_id, i))
      .collect();
    for raw in choices {
      let choice = raw.into_choice()?;
      if let Some(&i) = index.get(&choice.question_id) {
        questions[i].choices.push(choice);
      }
    }

    Ok(Some(SurveyDefinition { survey, questions }))
  }

  async fn set_survey_status(
    &self,
    survey_id: Uuid,
    status: SurveyStatus,
  ) -> Result<Option<Survey>> {
    let id_str = encode_uuid(survey_id);
    let status_str = status.to_string();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE surveys SET status = ?1 WHERE survey_id = ?2",
          rusqlite::params![status_str, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_survey(survey_id).await
  }

  async fn increment_counters(&self, survey_id: Uuid, delta: CounterDelta) -> Result<()> {
    let id_str = encode_uuid(survey_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE surveys SET
             total_sent         = total_sent + ?1,
             email_sent         = email_sent + ?2,
             messaging_sent     = messaging_sent + ?3,
             responses_received = responses_received + ?4
           WHERE survey_id = ?5",
          rusqlite::params![
            encode_count(delta.total_sent),
            encode_count(delta.email_sent),
            encode_count(delta.messaging_sent),
            encode_count(delta.responses_received),
            id_str,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SurveyNotFound(survey_id));
    }
    Ok(())
  }

  // ── Recipients ────────────────────────────────────────────────────────────

  async fn add_recipient(&self, input: NewRecipient) -> Result<Recipient> {
    let recipient = Recipient {
      recipient_id: Uuid::new_v4(),
      full_name:    input.full_name,
      email:        input.email,
      phone:        input.phone,
      created_at:   Utc::now(),
    };

    let id_str = encode_uuid(recipient.recipient_id);
    let name   = recipient.full_name.clone();
    let email  = recipient.email.clone();
    let phone  = recipient.phone.clone();
    let at_str = encode_dt(recipient.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO recipients (recipient_id, full_name, email, phone, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, email, phone, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(recipient)
  }

  async fn get_recipient(&self, recipient_id: Uuid) -> Result<Option<Recipient>> {
    let id_str = encode_uuid(recipient_id);

    let raw: Option<RawRecipient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT recipient_id, full_name, email, phone, created_at
             FROM recipients WHERE recipient_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawRecipient {
                recipient_id: row.get(0)?,
                full_name:    row.get(1)?,
                email:        row.get(2)?,
                phone:        row.get(3)?,
                created_at:   row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecipient::into_recipient).transpose()
  }

  // ── Invitations ───────────────────────────────────────────────────────────

  async fn find_invitation(
    &self,
    survey_id: Uuid,
    recipient_id: Uuid,
  ) -> Result<Option<Invitation>> {
    let survey_str = encode_uuid(survey_id);
    let recipient_str = encode_uuid(recipient_id);

    let raw: Option<RawInvitation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {INVITATION_COLUMNS} FROM invitations
               WHERE survey_id = ?1 AND recipient_id = ?2"
            ),
            rusqlite::params![survey_str, recipient_str],
            RawInvitation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInvitation::into_invitation).transpose()
  }

  async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>> {
    let token = token.to_owned();

    let raw: Option<RawInvitation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = ?1"),
            rusqlite::params![token],
            RawInvitation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInvitation::into_invitation).transpose()
  }

  async fn token_exists(&self, token: &str) -> Result<bool> {
    let token = token.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM invitations WHERE token = ?1",
            rusqlite::params![token],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(exists)
  }

  async fn insert_invitation(&self, invitation: Invitation) -> Result<InsertInvitation> {
    let id_str        = encode_uuid(invitation.invitation_id);
    let survey_str    = encode_uuid(invitation.survey_id);
    let recipient_str = encode_uuid(invitation.recipient_id);
    let token         = invitation.token.clone();
    let status_str    = invitation.status.to_string();
    let created_str   = encode_dt(invitation.created_at);

    let conflict: Option<Conflict> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO invitations (
             invitation_id, survey_id, recipient_id, token, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, survey_str, recipient_str, token, status_str, created_str],
        );
        match inserted {
          Ok(_) => Ok(None),
          Err(rusqlite::Error::SqliteFailure(err, Some(msg)))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            if msg.contains("invitations.token") {
              Ok(Some(Conflict::Token))
            } else if msg.contains("invitations.survey_id") {
              Ok(Some(Conflict::Pair))
            } else {
              Err(rusqlite::Error::SqliteFailure(err, Some(msg)).into())
            }
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(match conflict {
      None => InsertInvitation::Inserted(invitation),
      Some(Conflict::Pair) => InsertInvitation::PairExists,
      Some(Conflict::Token) => InsertInvitation::TokenTaken,
    })
  }

  async fn transition_invitation(
    &self,
    invitation_id: Uuid,
    next: InvitationStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Invitation>> {
    let from: Vec<String> = next
      .predecessors()
      .into_iter()
      .map(|s| format!("'{s}'"))
      .collect();
    if from.is_empty() {
      return Ok(None);
    }

    let stamp = match next {
      InvitationStatus::Sent => Some("sent_at"),
      InvitationStatus::Opened => Some("opened_at"),
      InvitationStatus::Completed => Some("completed_at"),
      InvitationStatus::Pending | InvitationStatus::Failed => None,
    };
    let guard = from.join(", ");
    let id_str = encode_uuid(invitation_id);
    let status_str = next.to_string();
    let at_str = encode_dt(at);

    let raw: Option<RawInvitation> = self
      .conn
      .call(move |conn| {
        let changed = match stamp {
          Some(column) => conn.execute(
            &format!(
              "UPDATE invitations SET status = ?1, {column} = ?2
               WHERE invitation_id = ?3 AND status IN ({guard})"
            ),
            rusqlite::params![status_str, at_str, id_str],
          )?,
          None => conn.execute(
            &format!(
              "UPDATE invitations SET status = ?1
               WHERE invitation_id = ?2 AND status IN ({guard})"
            ),
            rusqlite::params![status_str, id_str],
          )?,
        };
        if changed == 0 {
          return Ok(None);
        }

        Ok(conn
          .query_row(
            &format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE invitation_id = ?1"),
            rusqlite::params![id_str],
            RawInvitation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInvitation::into_invitation).transpose()
  }

  async fn list_invitations(&self, survey_id: Uuid) -> Result<Vec<Invitation>> {
    let id_str = encode_uuid(survey_id);

    let raws: Vec<RawInvitation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INVITATION_COLUMNS} FROM invitations
           WHERE survey_id = ?1
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawInvitation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInvitation::into_invitation).collect()
  }

  // ── Delivery log (append-only) ───────────────────────────────────────────

  async fn append_delivery(&self, entry: DeliveryLogEntry) -> Result<()> {
    let id_str        = encode_uuid(entry.entry_id);
    let survey_str    = encode_uuid(entry.survey_id);
    let recipient_str = encode_uuid(entry.recipient_id);
    let channel_str   = entry.channel.to_string();
    let outcome_str   = entry.outcome.to_string();
    let error         = entry.error;
    let at_str        = encode_dt(entry.attempted_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO delivery_log (
             entry_id, survey_id, recipient_id, channel, outcome, error, attempted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            survey_str,
            recipient_str,
            channel_str,
            outcome_str,
            error,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_deliveries(&self, survey_id: Uuid) -> Result<Vec<DeliveryLogEntry>> {
    let id_str = encode_uuid(survey_id);

    let raws: Vec<RawDelivery> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entry_id, survey_id, recipient_id, channel, outcome, error, attempted_at
           FROM delivery_log
           WHERE survey_id = ?1
           ORDER BY attempted_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawDelivery {
              entry_id:     row.get(0)?,
              survey_id:    row.get(1)?,
              recipient_id: row.get(2)?,
              channel:      row.get(3)?,
              outcome:      row.get(4)?,
              error:        row.get(5)?,
              attempted_at: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDelivery::into_entry).collect()
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn complete_invitation(
    &self,
    submission: CompletedSubmission,
  ) -> Result<CompletionOutcome> {
    let response_id = Uuid::new_v4();
    let answers: Vec<Answer> = submission
      .answers
      .into_iter()
      .map(|a| Answer {
        answer_id: Uuid::new_v4(),
        response_id,
        question_id: a.question_id,
        value: a.value,
      })
      .collect();
    let response = Response {
      response_id,
      survey_id: submission.survey_id,
      recipient_id: submission.recipient_id,
      invitation_id: submission.invitation_id,
      is_complete: true,
      submitted_at: submission.submitted_at,
      answers,
    };

    let answer_rows = response
      .answers
      .iter()
      .map(|a| {
        let (kind, json) = encode_answer(&a.value)?;
        Ok((encode_uuid(a.answer_id), encode_uuid(a.question_id), kind, json))
      })
      .collect::<Result<Vec<_>>>()?;
    let response_str   = encode_uuid(response_id);
    let survey_str     = encode_uuid(response.survey_id);
    let recipient_str  = encode_uuid(response.recipient_id);
    let invitation_str = encode_uuid(response.invitation_id);
    let at_str         = encode_dt(response.submitted_at);

    let recorded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let claimed = tx.execute(
          "UPDATE invitations SET status = 'completed', completed_at = ?1
           WHERE invitation_id = ?2 AND status = 'opened'",
          rusqlite::params![at_str, invitation_str],
        )?;
        if claimed == 0 {
          // Dropping the transaction rolls it back.
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO responses (
             response_id, survey_id, recipient_id, invitation_id, is_complete, submitted_at
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          rusqlite::params![response_str, survey_str, recipient_str, invitation_str, at_str],
        )?;
        for (answer_id, question_id, kind, json) in &answer_rows {
          tx.execute(
            "INSERT INTO answers (answer_id, response_id, question_id, kind, value_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![answer_id, response_str, question_id, kind, json],
          )?;
        }
        tx.execute(
          "UPDATE surveys SET responses_received = responses_received + 1
           WHERE survey_id = ?1",
          rusqlite::params![survey_str],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(if recorded {
      CompletionOutcome::Recorded(response)
    } else {
      CompletionOutcome::AlreadyCompleted
    })
  }

  async fn list_responses(&self, survey_id: Uuid) -> Result<Vec<Response>> {
    let id_str = encode_uuid(survey_id);

    let (responses, answers) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT response_id, survey_id, recipient_id, invitation_id, is_complete, submitted_at
           FROM responses
           WHERE survey_id = ?1
           ORDER BY submitted_at, rowid",
        )?;
        let responses = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawResponse {
              response_id:   row.get(0)?,
              survey_id:     row.get(1)?,
              recipient_id:  row.get(2)?,
              invitation_id: row.get(3)?,
              is_complete:   row.get(4)?,
              submitted_at:  row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT a.answer_id, a.response_id, a.question_id, a.kind, a.value_json
           FROM answers a
           JOIN responses r ON r.response_id = a.response_id
           JOIN questions q ON q.question_id = a.question_id
           WHERE r.survey_id = ?1
           ORDER BY q.position",
        )?;
        let answers = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawAnswer {
              answer_id:   row.get(0)?,
              response_id: row.get(1)?,
              question_id: row.get(2)?,
              kind:        row.get(3)?,
              value_json:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((responses, answers))
      })
      .await?;

    let mut by_response: HashMap<Uuid, Vec<Answer>> = HashMap::new();
    for raw in answers {
      let answer = raw.into_answer()?;
      by_response.entry(answer.response_id).or_default().push(answer);
    }

    responses
      .into_iter()
      .map(|raw| {
        let response_id = decode_uuid(&raw.response_id)?;
        let answers = by_response.remove(&response_id).unwrap_or_default();
        raw.into_response(answers)
      })
      .collect()
  }
}
