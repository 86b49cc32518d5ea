//! Delivery channels and the adapter contract the dispatch engine depends on.
//!
//! The core never talks to a mail relay or a messaging provider directly; it
//! hands a fully rendered message to a [`ChannelAdapter`]. Concrete adapters
//! live in `canvass-channels`.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A delivery medium with its own adapter and message template.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
  Email,
  /// Alternate messaging channel (WhatsApp in the reference deployment).
  Messaging,
}

impl Channel {
  pub const ALL: [Channel; 2] = [Channel::Email, Channel::Messaging];

  /// Whether messages on this channel carry a subject line.
  pub fn has_subject(self) -> bool { matches!(self, Self::Email) }
}

/// Why a single delivery attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
  #[error("no {0} address on file")]
  MissingAddress(Channel),

  #[error("{0} channel is not configured")]
  NotConfigured(Channel),

  #[error("timed out after {0:?}")]
  Timeout(Duration),

  #[error("rejected by provider: {0}")]
  Rejected(String),

  #[error("transport error: {0}")]
  Transport(String),

  /// The channel's message template could not be rendered.
  #[error("template error: {0}")]
  Template(String),
}

/// The narrow contract every delivery provider implements.
///
/// `subject` is `None` for channels without subject lines. Implementations
/// report provider refusals as [`DeliveryError::Rejected`] rather than
/// panicking; the engine records the error and moves on.
pub trait ChannelAdapter: Send + Sync {
  fn send<'a>(
    &'a self,
    destination: &'a str,
    subject: Option<&'a str>,
    body: &'a str,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;
}

/// The adapters available to one dispatch engine, one slot per channel.
///
/// An empty slot means the channel is unconfigured; every attempt on it is
/// recorded as [`DeliveryError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct Adapters<A> {
  pub email:     Option<A>,
  pub messaging: Option<A>,
}

impl<A> Adapters<A> {
  pub fn new(email: Option<A>, messaging: Option<A>) -> Self {
    Self { email, messaging }
  }

  pub fn get(&self, channel: Channel) -> Option<&A> {
    match channel {
      Channel::Email => self.email.as_ref(),
      Channel::Messaging => self.messaging.as_ref(),
    }
  }
}

impl<A> Default for Adapters<A> {
  fn default() -> Self { Self { email: None, messaging: None } }
}
