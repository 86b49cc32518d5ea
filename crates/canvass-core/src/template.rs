//! Message rendering for invitation deliveries.
//!
//! Templates are [Tera](tera) templates rendered with autoescaping off, since
//! every channel carries plain text. The variables are the fields of
//! [`RenderContext`]; `end_date` renders as `YYYY-MM-DD`.

use std::error::Error as _;

use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};
use uuid::Uuid;

use crate::{
  channel::{Channel, DeliveryError},
  survey::{MessageTemplates, Survey},
};

pub const DEFAULT_EMAIL_SUBJECT: &str = "Survey: {{ survey_title }}";

pub const DEFAULT_EMAIL_BODY: &str = "Dear {{ recipient_name }},

You are invited to take part in the following survey:

Survey: {{ survey_title }}
About: {{ survey_description }}

To participate, open the link below:
{{ survey_url }}

The survey closes on {{ end_date }}.

Please note:
- You can answer the survey once only.
- Your answers are stored securely.
- Results are used for research and planning purposes only.

Thank you for your time.

Alumni Relations Team
";

pub const DEFAULT_MESSAGING_BODY: &str = "Hello {{ recipient_name }},

Please take part in our survey: {{ survey_title }}

{{ survey_description }}

Survey link: {{ survey_url }}

Closes on: {{ end_date }}

One answer per person. Thank you!";

/// Values available to templates.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext<'a> {
  pub recipient_name:     &'a str,
  pub survey_title:       &'a str,
  pub survey_description: &'a str,
  pub survey_url:         &'a str,
  pub end_date:           NaiveDate,
}

/// A fully rendered message, ready for a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
  pub subject: Option<String>,
  pub body:    String,
}

/// `{base}/surveys/{survey_id}/take?token={token}`
///
/// Tokens are URL-safe base64, so no escaping is needed.
pub fn access_url(base_url: &str, survey_id: Uuid, token: &str) -> String {
  format!(
    "{}/surveys/{survey_id}/take?token={token}",
    base_url.trim_end_matches('/')
  )
}

/// Render one template against `ctx`.
pub fn render(template: &str, ctx: &RenderContext<'_>) -> tera::Result<String> {
  let context = Context::from_serialize(ctx)?;
  Tera::one_off(template, &context, false)
}

/// Parse `template` without rendering it, so broken templates are caught when
/// a survey is authored rather than on every delivery.
pub fn check(template: &str) -> Result<(), String> {
  Tera::default()
    .add_raw_template("check", template)
    .map_err(|e| describe(&e))
}

/// Check every custom template in `templates`.
pub fn check_all(templates: &MessageTemplates) -> Result<(), String> {
  let named = [
    ("email_subject", &templates.email_subject),
    ("email_body", &templates.email_body),
    ("messaging_body", &templates.messaging_body),
  ];
  for (name, template) in named {
    if let Some(t) = template {
      check(t).map_err(|e| format!("{name}: {e}"))?;
    }
  }
  Ok(())
}

/// Tera's top-level message names only the template; the cause is in the
/// source chain.
fn describe(e: &tera::Error) -> String {
  let mut out = e.to_string();
  let mut source = e.source();
  while let Some(cause) = source {
    out.push_str(": ");
    out.push_str(&cause.to_string());
    source = cause.source();
  }
  out
}

fn render_delivery(template: &str, ctx: &RenderContext<'_>) -> Result<String, DeliveryError> {
  render(template, ctx).map_err(|e| DeliveryError::Template(describe(&e)))
}

/// Render the message for `channel` from the survey's templates, falling back
/// to the defaults.
pub fn render_for(
  channel: Channel,
  survey: &Survey,
  ctx: &RenderContext<'_>,
) -> Result<RenderedMessage, DeliveryError> {
  let templates = &survey.templates;
  let message = match channel {
    Channel::Email => RenderedMessage {
      subject: Some(render_delivery(
        templates
          .email_subject
          .as_deref()
          .unwrap_or(DEFAULT_EMAIL_SUBJECT),
        ctx,
      )?),
      body:    render_delivery(
        templates.email_body.as_deref().unwrap_or(DEFAULT_EMAIL_BODY),
        ctx,
      )?,
    },
    Channel::Messaging => RenderedMessage {
      subject: None,
      body:    render_delivery(
        templates
          .messaging_body
          .as_deref()
          .unwrap_or(DEFAULT_MESSAGING_BODY),
        ctx,
      )?,
    },
  };
  Ok(message)
}
