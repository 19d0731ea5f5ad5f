//! Typed publish/subscribe bus keyed by room id.
//!
//! The driver publishes to a room id and never sees the transport that
//! delivers events to clients.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::ShipEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Per-room event fan-out.
#[derive(Default)]
pub struct EventBus {
    rooms: Mutex<HashMap<String, broadcast::Sender<ShipEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room's events. Creates the room if needed.
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ShipEvent> {
        self.sender(room_id).subscribe()
    }

    /// Publish an event to a room. Events with no listeners are dropped.
    pub fn publish(&self, room_id: &str, event: ShipEvent) {
        tracing::debug!(room_id, event = event.name(), "publish");
        let _ = self.sender(room_id).send(event);
    }

    /// An emitter bound to one room, handed to the driver and tool handlers.
    pub fn emitter(self: &Arc<Self>, room_id: impl Into<String>) -> RoomEmitter {
        RoomEmitter {
            bus: Arc::clone(self),
            room_id: room_id.into(),
        }
    }

    /// Drop a room's channel once its run is finished and clients are gone.
    pub fn remove_room(&self, room_id: &str) {
        self.rooms.lock().remove(room_id);
    }

    fn sender(&self, room_id: &str) -> broadcast::Sender<ShipEvent> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// A cloneable handle that publishes into one room.
#[derive(Clone)]
pub struct RoomEmitter {
    bus: Arc<EventBus>,
    room_id: String,
}

impl RoomEmitter {
    pub fn emit(&self, event: ShipEvent) {
        self.bus.publish(&self.room_id, event);
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}
