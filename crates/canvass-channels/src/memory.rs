//! An in-process adapter that records messages, for tests and local runs.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use canvass_core::channel::{ChannelAdapter, DeliveryError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
  pub destination: String,
  pub subject:     Option<String>,
  pub body:        String,
}

#[derive(Debug, Default)]
struct Outbox {
  sent:    Vec<SentMessage>,
  failing: HashSet<String>,
}

/// Records every message it accepts.
///
/// Clones share one outbox, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
  outbox: Arc<Mutex<Outbox>>,
}

impl MemoryAdapter {
  pub fn new() -> Self { Self::default() }

  /// Reject every message addressed to `destination`.
  pub fn failing_for(self, destination: impl Into<String>) -> Self {
    self.lock().failing.insert(destination.into());
    self
  }

  pub fn sent(&self) -> Vec<SentMessage> { self.lock().sent.clone() }

  fn lock(&self) -> MutexGuard<'_, Outbox> {
    self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl ChannelAdapter for MemoryAdapter {
  async fn send(
    &self,
    destination: &str,
    subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    let mut outbox = self.lock();
    if outbox.failing.contains(destination) {
      return Err(DeliveryError::Rejected(format!("{destination} bounced")));
    }
    outbox.sent.push(SentMessage {
      destination: destination.to_owned(),
      subject:     subject.map(str::to_owned),
      body:        body.to_owned(),
    });
    Ok(())
  }
}
