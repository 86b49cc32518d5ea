//! Response analytics.
//!
//! Everything here is read-only and derived on demand from stored responses.
//! Empty data produces zeroed summaries, never errors.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  answer::{AnswerValue, Response},
  store::SurveyStore,
  strategy,
  survey::{Question, QuestionType, SurveyDefinition},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalyticsOptions {
  /// Length of the trailing response timeline, in days.
  pub timeline_days:    u32,
  /// Number of raw text answers included per text question.
  pub text_sample_size: usize,
}

impl Default for AnalyticsOptions {
  fn default() -> Self { Self { timeline_days: 7, text_sample_size: 5 } }
}

/// `completed / total_sent`, or 0 when nothing was sent.
pub fn completion_rate(completed: u64, total_sent: u64) -> f64 {
  if total_sent == 0 {
    0.0
  } else {
    completed as f64 / total_sent as f64
  }
}

/// A ratio as a percentage rounded to one decimal place.
pub fn as_percentage(ratio: f64) -> f64 { (ratio * 1000.0).round() / 10.0 }

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceTally {
  pub choice_id:  Uuid,
  pub label:      String,
  pub count:      u64,
  /// Share of all responses that selected this choice.
  pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionSummary {
  Choice {
    /// One entry per choice, in position order.
    tally:    Vec<ChoiceTally>,
    majority: Option<ChoiceTally>,
  },
  Numeric {
    count: u64,
    mean:  f64,
    min:   Option<f64>,
    max:   Option<f64>,
  },
  Text {
    count:  u64,
    sample: Vec<String>,
  },
  Date {
    count:    u64,
    earliest: Option<NaiveDate>,
    latest:   Option<NaiveDate>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalytics {
  pub question_id:   Uuid,
  pub position:      u32,
  pub prompt:        String,
  pub question_type: QuestionType,
  /// Responses that answered this question.
  pub answered:      u64,
  pub summary:       QuestionSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
  pub date:  NaiveDate,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnalytics {
  pub survey_id:             Uuid,
  pub title:                 String,
  pub total_sent:            u64,
  pub email_sent:            u64,
  pub messaging_sent:        u64,
  pub responses:             u64,
  pub completion_rate:       f64,
  pub completion_percentage: f64,
  pub questions:             Vec<QuestionAnalytics>,
  /// Oldest day first.
  pub timeline:              Vec<DailyCount>,
}

/// Inputs shared by every per-question summariser.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext {
  pub total_responses:  u64,
  pub text_sample_size: usize,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Compute analytics for `definition` from its `responses`, with the
/// timeline ending on `today`.
pub fn analyze(
  definition: &SurveyDefinition,
  responses: &[Response],
  options: &AnalyticsOptions,
  today: NaiveDate,
) -> SurveyAnalytics {
  let completed: Vec<&Response> = responses.iter().filter(|r| r.is_complete).collect();
  let total = completed.len() as u64;
  let ctx = SummaryContext {
    total_responses:  total,
    text_sample_size: options.text_sample_size,
  };

  let mut questions: Vec<&Question> = definition.questions.iter().collect();
  questions.sort_by_key(|q| q.position);

  let questions = questions
    .into_iter()
    .map(|q| {
      let values: Vec<&AnswerValue> = completed
        .iter()
        .filter_map(|r| r.answer_for(q.question_id))
        .map(|a| &a.value)
        .collect();
      QuestionAnalytics {
        question_id:   q.question_id,
        position:      q.position,
        prompt:        q.prompt.clone(),
        question_type: q.question_type,
        answered:      values.len() as u64,
        summary:       (strategy::for_type(q.question_type).summarize)(q, &values, &ctx),
      }
    })
    .collect();

  let counters = definition.survey.counters;
  let rate = completion_rate(total, counters.total_sent);
  SurveyAnalytics {
    survey_id: definition.survey.survey_id,
    title: definition.survey.title.clone(),
    total_sent: counters.total_sent,
    email_sent: counters.email_sent,
    messaging_sent: counters.messaging_sent,
    responses: total,
    completion_rate: rate,
    completion_percentage: as_percentage(rate),
    questions,
    timeline: timeline(&completed, options.timeline_days, today),
  }
}

/// Responses per UTC day for the `days` days ending on `today`.
pub fn timeline(responses: &[&Response], days: u32, today: NaiveDate) -> Vec<DailyCount> {
  (0..days)
    .rev()
    .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
    .map(|date| DailyCount {
      date,
      count: responses
        .iter()
        .filter(|r| r.submitted_at.date_naive() == date)
        .count() as u64,
    })
    .collect()
}

// ─── Summarisers ─────────────────────────────────────────────────────────────

pub(crate) fn summarize_choices(
  question: &Question,
  values: &[&AnswerValue],
  ctx: &SummaryContext,
) -> QuestionSummary {
  let mut choices: Vec<_> = question.choices.iter().collect();
  choices.sort_by_key(|c| c.position);

  let tally: Vec<ChoiceTally> = choices
    .into_iter()
    .map(|choice| {
      let count = values
        .iter()
        .filter(|v| matches!(v, AnswerValue::Choices(ids) if ids.contains(&choice.choice_id)))
        .count() as u64;
      ChoiceTally {
        choice_id: choice.choice_id,
        label: choice.label.clone(),
        count,
        percentage: as_percentage(completion_rate(count, ctx.total_responses)),
      }
    })
    .collect();

  // Strictly greater keeps the earliest choice on ties.
  let mut majority: Option<&ChoiceTally> = None;
  for entry in tally.iter().filter(|t| t.count > 0) {
    if majority.is_none_or(|best| entry.count > best.count) {
      majority = Some(entry);
    }
  }
  let majority = majority.cloned();

  QuestionSummary::Choice { tally, majority }
}

pub(crate) fn summarize_numbers(
  _: &Question,
  values: &[&AnswerValue],
  _: &SummaryContext,
) -> QuestionSummary {
  let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
  let count = numbers.len() as u64;
  let mean = if numbers.is_empty() {
    0.0
  } else {
    numbers.iter().sum::<f64>() / numbers.len() as f64
  };
  QuestionSummary::Numeric {
    count,
    mean,
    min: numbers.iter().copied().reduce(f64::min),
    max: numbers.iter().copied().reduce(f64::max),
  }
}

pub(crate) fn summarize_text(
  _: &Question,
  values: &[&AnswerValue],
  ctx: &SummaryContext,
) -> QuestionSummary {
  let texts: Vec<&str> = values.iter().filter_map(|v| v.as_text()).collect();
  QuestionSummary::Text {
    count:  texts.len() as u64,
    sample: texts
      .into_iter()
      .take(ctx.text_sample_size)
      .map(str::to_owned)
      .collect(),
  }
}

pub(crate) fn summarize_dates(
  _: &Question,
  values: &[&AnswerValue],
  _: &SummaryContext,
) -> QuestionSummary {
  let dates: Vec<NaiveDate> = values
    .iter()
    .filter_map(|v| match v {
      AnswerValue::Date(d) => Some(*d),
      _ => None,
    })
    .collect();
  QuestionSummary::Date {
    count:    dates.len() as u64,
    earliest: dates.iter().min().copied(),
    latest:   dates.iter().max().copied(),
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct AnalyticsAggregator<S> {
  store:   Arc<S>,
  options: AnalyticsOptions,
}

impl<S: SurveyStore> AnalyticsAggregator<S> {
  pub fn new(store: Arc<S>, options: AnalyticsOptions) -> Self { Self { store, options } }

  pub fn options(&self) -> &AnalyticsOptions { &self.options }

  pub async fn survey(&self, survey_id: Uuid) -> Result<SurveyAnalytics> {
    let definition = self
      .store
      .get_definition(survey_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SurveyNotFound(survey_id))?;
    let responses = self
      .store
      .list_responses(survey_id)
      .await
      .map_err(Error::store)?;
    Ok(analyze(
      &definition,
      &responses,
      &self.options,
      Utc::now().date_naive(),
    ))
  }
}
