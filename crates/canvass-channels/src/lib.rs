//! Delivery adapters for Canvass invitation channels.
//!
//! Each adapter implements [`canvass_core::channel::ChannelAdapter`]. The
//! dispatch engine holds one adapter type for every channel, so deployments
//! wire up an [`AnyAdapter`] per slot.

mod any;
mod dry_run;
mod email;
mod memory;
mod messaging;

pub mod error;

pub use any::AnyAdapter;
pub use dry_run::DryRunAdapter;
pub use email::{EmailSettings, HttpEmailAdapter};
pub use error::{Error, Result};
pub use memory::{MemoryAdapter, SentMessage};
pub use messaging::{MessagingSettings, WhatsAppAdapter, normalize_phone};
