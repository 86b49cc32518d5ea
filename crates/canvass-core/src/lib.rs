//! Core types and services for Canvass survey distribution.
//!
//! This crate has no HTTP or database dependencies. Storage
//! is reached through [`store::SurveyStore`] and delivery through
//! [`channel::ChannelAdapter`]; concrete backends live in sibling crates.

#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod answer;
pub mod channel;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod invitation;
pub mod issuer;
pub mod recipient;
pub mod store;
pub mod strategy;
pub mod survey;
pub mod template;

pub use error::{Error, Result};
