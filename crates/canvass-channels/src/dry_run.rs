//! An adapter that logs messages instead of sending them.

use canvass_core::channel::{Channel, ChannelAdapter, DeliveryError};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct DryRunAdapter {
  channel: Channel,
}

impl DryRunAdapter {
  pub fn new(channel: Channel) -> Self { Self { channel } }
}

impl ChannelAdapter for DryRunAdapter {
  async fn send(
    &self,
    destination: &str,
    subject: Option<&str>,
    body: &str,
  ) -> Result<(), DeliveryError> {
    info!(
      channel = %self.channel,
      %destination,
      subject = subject.unwrap_or("-"),
      chars = body.chars().count(),
      "dry run, message not sent"
    );
    Ok(())
  }
}
