//! Messaging delivery through the WhatsApp Cloud API.

use std::time::Duration;

use canvass_core::channel::{ChannelAdapter, DeliveryError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingSettings {
  #[serde(default = "default_api_url")]
  pub api_url:              String,
  pub access_token:         String,
  pub phone_number_id:      String,
  /// Prefixed to local numbers, without `+`.
  #[serde(default = "default_country_code")]
  pub default_country_code: String,
}

fn default_api_url() -> String { "https://graph.facebook.com/v17.0".into() }

fn default_country_code() -> String { "966".into() }

/// Reduce `raw` to digits in international form.
///
/// Punctuation and spaces are dropped. A leading `0` is replaced by
/// `country_code`, and numbers not already starting with it get it prefixed.
/// Returns `None` when no digits remain.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
  let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
  if digits.is_empty() {
    return None;
  }
  if digits.starts_with(country_code) {
    return Some(digits);
  }
  let local = digits.strip_prefix('0').unwrap_or(&digits);
  Some(format!("{country_code}{local}"))
}

#[derive(Debug, Clone)]
pub struct WhatsAppAdapter {
  client:   Client,
  settings: MessagingSettings,
}

impl WhatsAppAdapter {
  pub fn new(settings: MessagingSettings, timeout: Duration) -> Result<Self> {
    if settings.access_token.is_empty() || settings.phone_number_id.is_empty() {
      return Err(Error::InvalidSetting(
        "messaging needs both an access token and a phone number id".into(),
      ));
    }
    if !settings.default_country_code.chars().all(|c| c.is_ascii_digit()) {
      return Err(Error::InvalidSetting(format!(
        "country code {:?} must be digits only",
        settings.default_country_code
      )));
    }
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, settings })
  }

  fn endpoint(&self) -> String {
    format!(
      "{}/{}/messages",
      self.settings.api_url.trim_end_matches('/'),
      self.settings.phone_number_id
    )
  }
}

fn text_message(to: &str, body: &str) -> serde_json::Value {
  json!({
    "messaging_product": "whatsapp",
    "to": to,
    "type": "text",
    "text": { "body": body },
  })
}

impl ChannelAdapter for WhatsAppAdapter {
  async fn send(
    &self,
    destination: &str,
    _subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    let to = normalize_phone(destination, &self.settings.default_country_code)
      .ok_or_else(|| DeliveryError::Rejected(format!("invalid phone number {destination:?}")))?;

    let resp = self
      .client
      .post(self.endpoint())
      .bearer_auth(&self.settings.access_token)
      .json(&text_message(&to, body))
      .send()
      .await
      .map_err(|e| DeliveryError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      return Err(DeliveryError::Rejected(format!("HTTP {status}: {detail}")));
    }

    debug!(%to, "message accepted by provider");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings() -> MessagingSettings {
    MessagingSettings {
      api_url:              default_api_url(),
      access_token:         "token".into(),
      phone_number_id:      "10555".into(),
      default_country_code: "966".into(),
    }
  }

  #[test]
  fn local_numbers_get_country_code() {
    assert_eq!(normalize_phone("0501234567", "966").as_deref(), Some("966501234567"));
    assert_eq!(normalize_phone("501234567", "966").as_deref(), Some("966501234567"));
  }

  #[test]
  fn international_numbers_are_kept() {
    assert_eq!(
      normalize_phone("+966 50-123-4567", "966").as_deref(),
      Some("966501234567")
    );
  }

  #[test]
  fn numbers_without_digits_are_invalid() {
    assert_eq!(normalize_phone(" - ", "966"), None);
  }

  #[test]
  fn endpoint_and_payload() {
    let adapter = WhatsAppAdapter::new(settings(), Duration::from_secs(5)).unwrap();
    assert_eq!(
      adapter.endpoint(),
      "https://graph.facebook.com/v17.0/10555/messages"
    );
    assert_eq!(
      text_message("966501234567", "Hi"),
      json!({
        "messaging_product": "whatsapp",
        "to": "966501234567",
        "type": "text",
        "text": { "body": "Hi" },
      })
    );
  }

  #[test]
  fn missing_credentials_are_refused() {
    let mut s = settings();
    s.access_token.clear();
    assert!(matches!(
      WhatsAppAdapter::new(s, Duration::from_secs(5)),
      Err(Error::InvalidSetting(_))
    ));
  }
}
