//! Onboarding entry point: gate check, then the conversation loop
//!
//! `Onboarding::start` is the one call the transport layer makes per ship
//! request. The gate runs before the driver so a quota-exhausted user never
//! costs a completion call.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    bus::EventBus,
    driver::Driver,
    events::ShipEvent,
    gate::{AccessGate, GateDecision},
    request::ShipRequest,
};

pub struct Onboarding {
    gate: AccessGate,
    driver: Driver,
    bus: Arc<EventBus>,
}

impl Onboarding {
    pub fn new(gate: AccessGate, driver: Driver, bus: Arc<EventBus>) -> Self {
        Self { gate, driver, bus }
    }

    /// Handle one ship request end to end.
    ///
    /// Every path emits at least one event to the room, so the client is
    /// never left waiting on a silently rejected request.
    pub async fn start(&self, request: ShipRequest, cancel: CancellationToken) {
        let emitter = self.bus.emitter(&request.room_id);

        let decision = match self
            .gate
            .check(&request.user_id, request.api_key_override.as_deref())
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(user_id = %request.user_id, error = %e, "gate check failed");
                emitter.emit(ShipEvent::Error {
                    error: e.to_string(),
                });
                return;
            }
        };

        match decision {
            GateDecision::Proceed { used_override } => {
                tracing::info!(
                    room_id = %request.room_id,
                    user_id = %request.user_id,
                    ship_type = ?request.ship_type,
                    used_override,
                    "ship request accepted"
                );
                self.driver.execute(&request, cancel).await;
            }
            GateDecision::PaymentRequired => {
                emitter.emit(ShipEvent::ShowPaymentOptions {
                    error: "You have no ships available. Purchase a ship to continue.".to_string(),
                });
            }
            GateDecision::InvalidKey { message } => {
                emitter.emit(ShipEvent::ApiKeyStatus {
                    success: false,
                    message,
                    key: None,
                });
            }
        }
    }
}
