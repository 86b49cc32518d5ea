//! Runtime configuration, deserialised from `config.toml` and `CANVASS_*`
//! environment variables.
//!
//! Every field has a default, so the server starts without a config file.
//! Nested keys use `__` in environment variables, e.g.
//! `CANVASS_DISPATCH__BASE_URL`.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use canvass_channels::{EmailSettings, MessagingSettings};
use canvass_core::{analytics::AnalyticsOptions, dispatch::DispatchConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub dispatch:   DispatchSettings,
  pub analytics:  AnalyticsSettings,
  pub email:      Option<EmailSettings>,
  pub messaging:  Option<MessagingSettings>,
  /// Log messages for channels without settings instead of failing them.
  pub dry_run:    bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8000,
      store_path: PathBuf::from("~/.local/share/canvass/canvass.db"),
      dispatch:   DispatchSettings::default(),
      analytics:  AnalyticsSettings::default(),
      email:      None,
      messaging:  None,
      dry_run:    false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
  /// Public origin respondents open, e.g. `https://alumni.example.org`.
  pub base_url:          String,
  pub send_timeout_secs: u64,
}

impl Default for DispatchSettings {
  fn default() -> Self {
    let defaults = DispatchConfig::default();
    Self {
      base_url:          defaults.base_url,
      send_timeout_secs: defaults.send_timeout.as_secs(),
    }
  }
}

impl DispatchSettings {
  pub fn send_timeout(&self) -> Duration { Duration::from_secs(self.send_timeout_secs) }

  pub fn to_dispatch_config(&self) -> DispatchConfig {
    DispatchConfig { base_url: self.base_url.clone(), send_timeout: self.send_timeout() }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
  pub timeline_days:    u32,
  pub text_sample_size: usize,
}

impl Default for AnalyticsSettings {
  fn default() -> Self {
    let defaults = AnalyticsOptions::default();
    Self {
      timeline_days:    defaults.timeline_days,
      text_sample_size: defaults.text_sample_size,
    }
  }
}

impl From<&AnalyticsSettings> for AnalyticsOptions {
  fn from(s: &AnalyticsSettings) -> Self {
    AnalyticsOptions { timeline_days: s.timeline_days, text_sample_size: s.text_sample_size }
  }
}

/// Layer `path` (if it exists) under the `CANVASS_*` environment.
pub fn load(path: PathBuf) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("CANVASS")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}
