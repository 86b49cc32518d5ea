//! Dispatch engine: issue invitations and deliver them over channels.
//!
//! A batch walks its recipients sequentially. Every attempt lands in the
//! delivery log, and a failure for one recipient never stops the batch: the
//! caller gets an aggregate [`DispatchReport`] instead.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  channel::{Adapters, Channel, ChannelAdapter, DeliveryError},
  delivery::DeliveryLogEntry,
  invitation::InvitationStatus,
  issuer::{Issued, issue},
  recipient::Recipient,
  store::SurveyStore,
  survey::{CounterDelta, Survey, SurveyStatus},
  template::{RenderContext, RenderedMessage, access_url, render_for},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Settings injected once when the engine is built.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// Public origin used to build access URLs, e.g. `https://alumni.example.org`.
  pub base_url:     String,
  /// Upper bound on a single adapter call.
  pub send_timeout: Duration,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      base_url:     "http://127.0.0.1:8000".to_owned(),
      send_timeout: Duration::from_secs(30),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTally {
  pub sent:   u64,
  pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
  pub recipient_id: Uuid,
  /// `None` when the recipient failed before any channel was tried.
  pub channel:      Option<Channel>,
  pub reason:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecipient {
  pub recipient_id: Uuid,
  pub reason:       String,
}

/// Aggregate outcome of one dispatch batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
  pub survey_id: Uuid,
  pub channels:  BTreeMap<Channel, ChannelTally>,
  /// Recipients reached on at least one channel.
  pub succeeded: u64,
  /// Recipients reached on no channel.
  pub failed:    u64,
  pub failures:  Vec<DispatchFailure>,
  pub skipped:   Vec<SkippedRecipient>,
}

impl DispatchReport {
  fn new(survey_id: Uuid, channels: &[Channel]) -> Self {
    Self {
      survey_id,
      channels: channels
        .iter()
        .map(|c| (*c, ChannelTally::default()))
        .collect(),
      succeeded: 0,
      failed: 0,
      failures: Vec::new(),
      skipped: Vec::new(),
    }
  }

  pub fn tally(&self, channel: Channel) -> ChannelTally {
    self.channels.get(&channel).copied().unwrap_or_default()
  }

  /// Human-readable summary, e.g. `"12 succeeded, 1 failed, 0 skipped"`.
  pub fn summary(&self) -> String {
    format!(
      "{} succeeded, {} failed, {} skipped",
      self.succeeded,
      self.failed,
      self.skipped.len()
    )
  }

  fn record_failure(&mut self, recipient_id: Uuid, channel: Option<Channel>, reason: String) {
    if let Some(c) = channel {
      self.channels.entry(c).or_default().failed += 1;
    }
    self.failures.push(DispatchFailure { recipient_id, channel, reason });
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct DispatchEngine<S, A> {
  store:    Arc<S>,
  adapters: Adapters<A>,
  config:   DispatchConfig,
}

impl<S, A> DispatchEngine<S, A>
where
  S: SurveyStore,
  A: ChannelAdapter,
{
  pub fn new(store: Arc<S>, adapters: Adapters<A>, config: DispatchConfig) -> Self {
    Self { store, adapters, config }
  }

  pub fn config(&self) -> &DispatchConfig { &self.config }

  pub fn adapters(&self) -> &Adapters<A> { &self.adapters }

  /// Issue and deliver invitations for `recipients` over `channels`.
  ///
  /// An empty `channels` slice means the survey's default channels. Errors
  /// are returned only for batch-level preconditions (unknown or closed
  /// survey, undispatchable definition) and for the final counter update;
  /// everything per recipient is folded into the report.
  pub async fn dispatch(
    &self,
    survey_id: Uuid,
    recipients: &[Uuid],
    channels: &[Channel],
  ) -> Result<DispatchReport> {
    let definition = self
      .store
      .get_definition(survey_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SurveyNotFound(survey_id))?;

    if definition.survey.status == SurveyStatus::Closed {
      return Err(Error::SurveyClosed(survey_id));
    }
    definition.validate_dispatchable()?;

    let channels = effective_channels(channels, &definition.survey);
    let mut report = DispatchReport::new(survey_id, &channels);
    let mut delta = CounterDelta::default();

    for &recipient_id in recipients {
      if let Err(e) = self
        .dispatch_one(&definition.survey, recipient_id, &channels, &mut report, &mut delta)
        .await
      {
        warn!(%survey_id, %recipient_id, error = %e, "dispatch failed for recipient");
        report.failed += 1;
        report.record_failure(recipient_id, None, e.to_string());
      }
    }

    if !delta.is_empty() {
      self
        .store
        .increment_counters(survey_id, delta)
        .await
        .map_err(Error::store)?;
    }

    info!(%survey_id, summary = %report.summary(), "dispatch batch finished");
    Ok(report)
  }

  async fn dispatch_one(
    &self,
    survey: &Survey,
    recipient_id: Uuid,
    channels: &[Channel],
    report: &mut DispatchReport,
    delta: &mut CounterDelta,
  ) -> Result<()> {
    let Some(recipient) = self
      .store
      .get_recipient(recipient_id)
      .await
      .map_err(Error::store)?
    else {
      return Err(Error::RecipientNotFound(recipient_id));
    };

    let Issued { invitation, created } =
      issue(self.store.as_ref(), survey.survey_id, recipient_id).await?;
    if created {
      delta.total_sent += 1;
    }

    if invitation.status.is_terminal() {
      report.skipped.push(SkippedRecipient {
        recipient_id,
        reason: format!("invitation already {}", invitation.status),
      });
      return Ok(());
    }

    let url = access_url(&self.config.base_url, survey.survey_id, &invitation.token);
    let ctx = RenderContext {
      recipient_name:     &recipient.full_name,
      survey_title:       &survey.title,
      survey_description: &survey.description,
      survey_url:         &url,
      end_date:           survey.window.ends_at.date_naive(),
    };

    let mut delivered = false;
    for &channel in channels {
      let outcome = match render_for(channel, survey, &ctx) {
        Ok(message) => self.deliver(channel, &recipient, &message).await,
        Err(e) => Err(e),
      };
      match outcome {
        Ok(()) => {
          debug!(%recipient_id, %channel, "delivered invitation");
          self
            .store
            .append_delivery(DeliveryLogEntry::sent(survey.survey_id, recipient_id, channel))
            .await
            .map_err(Error::store)?;
          report.channels.entry(channel).or_default().sent += 1;
          delta.record_delivery(channel);
          delivered = true;
        }
        Err(e) => {
          warn!(%recipient_id, %channel, error = %e, "delivery failed");
          self
            .store
            .append_delivery(DeliveryLogEntry::failed(
              survey.survey_id,
              recipient_id,
              channel,
              e.to_string(),
            ))
            .await
            .map_err(Error::store)?;
          report.record_failure(recipient_id, Some(channel), e.to_string());
        }
      }
    }

    // Only a pending invitation moves. A failed resend never takes back a
    // link that already reached the recipient, and with several channels
    // tried and all failing the invitation stays pending.
    let next = match (delivered, invitation.status) {
      (true, InvitationStatus::Pending) => Some(InvitationStatus::Sent),
      (false, InvitationStatus::Pending) if channels.len() == 1 => Some(InvitationStatus::Failed),
      _ => None,
    };
    if let Some(next) = next {
      self
        .store
        .transition_invitation(invitation.invitation_id, next, Utc::now())
        .await
        .map_err(Error::store)?;
    }

    // Counted last, so a store error above leaves the recipient counted once,
    // as a failure, by the caller.
    if delivered {
      report.succeeded += 1;
    } else {
      report.failed += 1;
    }
    Ok(())
  }

  async fn deliver(
    &self,
    channel: Channel,
    recipient: &Recipient,
    message: &RenderedMessage,
  ) -> Result<(), DeliveryError> {
    let adapter = self
      .adapters
      .get(channel)
      .ok_or(DeliveryError::NotConfigured(channel))?;
    let destination = recipient
      .address_for(channel)
      .ok_or(DeliveryError::MissingAddress(channel))?;

    let send = adapter.send(destination, message.subject.as_deref(), &message.body);
    match tokio::time::timeout(self.config.send_timeout, send).await {
      Ok(result) => result,
      Err(_) => Err(DeliveryError::Timeout(self.config.send_timeout)),
    }
  }
}

/// Requested channels, de-duplicated in order, or the survey defaults.
fn effective_channels(requested: &[Channel], survey: &Survey) -> Vec<Channel> {
  let source = if requested.is_empty() {
    survey.default_channels.as_slice()
  } else {
    requested
  };
  let mut out: Vec<Channel> = Vec::with_capacity(source.len());
  for c in source {
    if !out.contains(c) {
      out.push(*c);
    }
  }
  if out.is_empty() {
    out.push(Channel::Email);
  }
  out
}
