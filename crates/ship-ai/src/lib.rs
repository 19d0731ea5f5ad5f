//! ship-ai: completion client for the ShipStation onboarding loop
//!
//! This crate provides the message/content types used by the conversation
//! driver and a non-streaming client for the Anthropic Messages API.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AnthropicClient, ModelClient};
pub use error::{Error, Result};
pub use types::*;
