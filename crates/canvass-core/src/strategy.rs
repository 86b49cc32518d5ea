//! Per-question-type strategies.
//!
//! Each [`QuestionType`] maps to one [`QuestionStrategy`] bundling how raw
//! submission values are validated, how the question is rendered as a form
//! field, and how its answers are summarised. The table is resolved once per
//! question via [`for_type`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  analytics::{self, QuestionSummary, SummaryContext},
  answer::AnswerValue,
  survey::{Question, QuestionType},
};

/// Longest accepted answer to a short-text question, in characters.
pub const SHORT_TEXT_MAX_CHARS: usize = 500;

/// Turn a raw value into an answer. `Ok(None)` means "not answered".
pub type Validator = fn(&Question, &Value) -> Result<Option<AnswerValue>, String>;
pub type Renderer = fn(&Question) -> FieldSpec;
pub type Summarizer = fn(&Question, &[&AnswerValue], &SummaryContext) -> QuestionSummary;

#[derive(Clone, Copy)]
pub struct QuestionStrategy {
  pub validate:  Validator,
  pub render:    Renderer,
  pub summarize: Summarizer,
}

static SHORT_TEXT: QuestionStrategy = QuestionStrategy {
  validate:  validate_short_text,
  render:    render_text_input,
  summarize: analytics::summarize_text,
};

static LONG_TEXT: QuestionStrategy = QuestionStrategy {
  validate:  validate_long_text,
  render:    render_text_area,
  summarize: analytics::summarize_text,
};

static SINGLE_CHOICE: QuestionStrategy = QuestionStrategy {
  validate:  validate_single_choice,
  render:    render_radio,
  summarize: analytics::summarize_choices,
};

static MULTI_CHOICE: QuestionStrategy = QuestionStrategy {
  validate:  validate_multi_choice,
  render:    render_checkbox,
  summarize: analytics::summarize_choices,
};

static NUMERIC: QuestionStrategy = QuestionStrategy {
  validate:  validate_numeric,
  render:    render_number_input,
  summarize: analytics::summarize_numbers,
};

static DATE: QuestionStrategy = QuestionStrategy {
  validate:  validate_date,
  render:    render_date_picker,
  summarize: analytics::summarize_dates,
};

static RATING: QuestionStrategy = QuestionStrategy {
  validate:  validate_rating,
  render:    render_rating_scale,
  summarize: analytics::summarize_numbers,
};

pub fn for_type(question_type: QuestionType) -> &'static QuestionStrategy {
  match question_type {
    QuestionType::ShortText => &SHORT_TEXT,
    QuestionType::LongText => &LONG_TEXT,
    QuestionType::SingleChoice => &SINGLE_CHOICE,
    QuestionType::MultiChoice => &MULTI_CHOICE,
    QuestionType::Numeric => &NUMERIC,
    QuestionType::Date => &DATE,
    QuestionType::Rating => &RATING,
  }
}

// ─── Form fields ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
  TextInput { max_length: usize },
  TextArea,
  Radio,
  Checkbox,
  NumberInput,
  DatePicker,
  RatingScale { min: u8, max: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
  pub choice_id: Uuid,
  pub label:     String,
}

/// One field of the public survey form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
  pub question_id: Uuid,
  pub position:    u32,
  pub prompt:      String,
  pub help_text:   Option<String>,
  pub required:    bool,
  pub widget:      Widget,
  pub choices:     Vec<ChoiceOption>,
}

fn field(question: &Question, widget: Widget) -> FieldSpec {
  FieldSpec {
    question_id: question.question_id,
    position: question.position,
    prompt: question.prompt.clone(),
    help_text: question.help_text.clone(),
    required: question.required,
    widget,
    choices: question
      .choices
      .iter()
      .map(|c| ChoiceOption { choice_id: c.choice_id, label: c.label.clone() })
      .collect(),
  }
}

fn render_text_input(q: &Question) -> FieldSpec {
  field(q, Widget::TextInput { max_length: SHORT_TEXT_MAX_CHARS })
}

fn render_text_area(q: &Question) -> FieldSpec { field(q, Widget::TextArea) }

fn render_radio(q: &Question) -> FieldSpec { field(q, Widget::Radio) }

fn render_checkbox(q: &Question) -> FieldSpec { field(q, Widget::Checkbox) }

fn render_number_input(q: &Question) -> FieldSpec { field(q, Widget::NumberInput) }

fn render_date_picker(q: &Question) -> FieldSpec { field(q, Widget::DatePicker) }

fn render_rating_scale(q: &Question) -> FieldSpec {
  field(q, Widget::RatingScale { min: 1, max: q.rating_scale() })
}

// ─── Validators ──────────────────────────────────────────────────────────────

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    Value::Array(items) => items.is_empty(),
    _ => false,
  }
}

fn text(value: &Value) -> Result<Option<String>, String> {
  if is_blank(value) {
    return Ok(None);
  }
  match value {
    Value::String(s) => Ok(Some(s.trim().to_owned())),
    other => Err(format!("expected text, got {other}")),
  }
}

fn validate_short_text(_: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  let Some(s) = text(value)? else { return Ok(None) };
  if s.chars().count() > SHORT_TEXT_MAX_CHARS {
    return Err(format!("answer exceeds {SHORT_TEXT_MAX_CHARS} characters"));
  }
  Ok(Some(AnswerValue::Text(s)))
}

fn validate_long_text(_: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  Ok(text(value)?.map(AnswerValue::Text))
}

fn number(value: &Value) -> Result<Option<f64>, String> {
  if is_blank(value) {
    return Ok(None);
  }
  let n = match value {
    Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not representable"))?,
    Value::String(s) => s
      .trim()
      .parse::<f64>()
      .map_err(|_| format!("{s:?} is not a number"))?,
    other => return Err(format!("expected a number, got {other}")),
  };
  if !n.is_finite() {
    return Err("number must be finite".into());
  }
  Ok(Some(n))
}

fn validate_numeric(_: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  Ok(number(value)?.map(AnswerValue::Number))
}

fn validate_rating(q: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  let Some(n) = number(value)? else { return Ok(None) };
  let max = q.rating_scale();
  if n.fract() != 0.0 || n < 1.0 || n > f64::from(max) {
    return Err(format!("rating must be a whole number from 1 to {max}"));
  }
  Ok(Some(AnswerValue::Number(n)))
}

fn validate_date(_: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  let Some(s) = text(value)? else { return Ok(None) };
  NaiveDate::parse_from_str(&s, "%Y-%m-%d")
    .map(|d| Some(AnswerValue::Date(d)))
    .map_err(|_| format!("{s:?} is not a YYYY-MM-DD date"))
}

/// Collect choice ids from a string or an array of strings, checking each
/// belongs to `q`. Duplicates are dropped, first occurrence wins.
fn choice_ids(q: &Question, value: &Value) -> Result<Vec<Uuid>, String> {
  let raw: Vec<&Value> = match value {
    Value::Array(items) => items.iter().collect(),
    other => vec![other],
  };

  let mut ids = Vec::with_capacity(raw.len());
  for item in raw {
    let s = item
      .as_str()
      .ok_or_else(|| format!("expected a choice id, got {item}"))?;
    let id = Uuid::parse_str(s.trim()).map_err(|_| format!("{s:?} is not a choice id"))?;
    if q.choice(id).is_none() {
      return Err(format!("choice {id} does not belong to this question"));
    }
    if !ids.contains(&id) {
      ids.push(id);
    }
  }
  Ok(ids)
}

fn validate_single_choice(q: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  if is_blank(value) {
    return Ok(None);
  }
  let ids = choice_ids(q, value)?;
  if ids.len() != 1 {
    return Err(format!("exactly one choice expected, got {}", ids.len()));
  }
  Ok(Some(AnswerValue::Choices(ids)))
}

fn validate_multi_choice(q: &Question, value: &Value) -> Result<Option<AnswerValue>, String> {
  if is_blank(value) {
    return Ok(None);
  }
  Ok(Some(AnswerValue::Choices(choice_ids(q, value)?)))
}
