//! A single adapter type covering every concrete adapter.

use canvass_core::channel::{ChannelAdapter, DeliveryError};

use crate::{DryRunAdapter, HttpEmailAdapter, MemoryAdapter, WhatsAppAdapter};

#[derive(Debug, Clone)]
pub enum AnyAdapter {
  Email(HttpEmailAdapter),
  WhatsApp(WhatsAppAdapter),
  DryRun(DryRunAdapter),
  Memory(MemoryAdapter),
}

impl ChannelAdapter for AnyAdapter {
  async fn send(
    &self,
    destination: &str,
    subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    match self {
      Self::Email(a) => a.send(destination, subject, body).await,
      Self::WhatsApp(a) => a.send(destination, subject, body).await,
      Self::DryRun(a) => a.send(destination, subject, body).await,
      Self::Memory(a) => a.send(destination, subject, body).await,
    }
  }
}

impl From<HttpEmailAdapter> for AnyAdapter {
  fn from(a: HttpEmailAdapter) -> Self { Self::Email(a) }
}

impl From<WhatsAppAdapter> for AnyAdapter {
  fn from(a: WhatsAppAdapter) -> Self { Self::WhatsApp(a) }
}

impl From<DryRunAdapter> for AnyAdapter {
  fn from(a: DryRunAdapter) -> Self { Self::DryRun(a) }
}

impl From<MemoryAdapter> for AnyAdapter {
  fn from(a: MemoryAdapter) -> Self { Self::Memory(a) }
}
