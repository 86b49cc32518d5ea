//! Error type for `canvass-channels`.
//!
//! Only adapter construction can fail here; delivery failures are reported as
//! [`canvass_core::channel::DeliveryError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid channel setting: {0}")]
  InvalidSetting(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
