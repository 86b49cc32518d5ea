//! Email delivery through an HTTP mail relay.
//!
//! The relay receives one JSON document per message and is responsible for
//! SMTP. Any 2xx status counts as accepted.

use std::time::Duration;

use canvass_core::channel::{ChannelAdapter, DeliveryError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
  /// Relay endpoint that accepts `POST` with a JSON message.
  pub endpoint: String,
  /// Sent as a bearer token when present.
  #[serde(default)]
  pub api_key:  Option<String>,
  /// Sender address, e.g. `alumni@example.org`.
  pub from:     String,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
  from:    &'a str,
  to:      &'a str,
  subject: &'a str,
  text:    &'a str,
}

/// Cheap to clone, since the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpEmailAdapter {
  client:   Client,
  settings: EmailSettings,
}

impl HttpEmailAdapter {
  pub fn new(settings: EmailSettings, timeout: Duration) -> Result<Self> {
    if settings.endpoint.trim().is_empty() {
      return Err(Error::InvalidSetting("email endpoint is empty".into()));
    }
    if settings.from.trim().is_empty() {
      return Err(Error::InvalidSetting("email sender address is empty".into()));
    }
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, settings })
  }
}

impl ChannelAdapter for HttpEmailAdapter {
  async fn send(
    &self,
    destination: &str,
    subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    let message = RelayMessage {
      from: &self.settings.from,
      to: destination,
      subject: subject.unwrap_or_default(),
      text: body,
    };

    let mut req = self.client.post(&self.settings.endpoint).json(&message);
    if let Some(key) = &self.settings.api_key {
      req = req.bearer_auth(key);
    }

    let resp = req
      .send()
      .await
      .map_err(|e| DeliveryError::Transport(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      return Err(DeliveryError::Rejected(format!("HTTP {status}: {detail}")));
    }

    debug!(%destination, "email accepted by relay");
    Ok(())
  }
}
