//! ship-agent: the AI onboarding loop
//!
//! This crate provides the conversation driver that takes a ship request
//! through the model tool-use loop to deployment, plus the tool dispatcher,
//! the credential/quota gate, and the per-room event bus.

pub mod bus;
pub mod driver;
pub mod error;
pub mod events;
pub mod gate;
pub mod onboarding;
pub mod prompts;
pub mod request;
pub mod tools;

pub use bus::{EventBus, RoomEmitter};
pub use driver::{Driver, ModelFactory};
pub use error::{Error, Result};
pub use events::ShipEvent;
pub use gate::{AccessGate, FixedQuotaStore, GateDecision, KeyValidator, QuotaStore};
pub use onboarding::Onboarding;
pub use request::{ImageUpload, ShipRequest, ShipType};
pub use tools::{SearchProvider, ToolCall, ToolKind, Toolbox};
