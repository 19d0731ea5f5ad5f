//! WebSocket gateway
//!
//! Clients exchange JSON frames shaped `{"event": ..., "data": ...}` in both
//! directions. Inbound frames start, abort, or validate; outbound frames are
//! the room's `ShipEvent` stream serialized as-is.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ship_agent::{EventBus, ImageUpload, KeyValidator, Onboarding, ShipEvent, ShipRequest, ShipType};
use ship_storage::Storage;

/// Rooms with a run in flight, with the token that aborts them.
#[derive(Default)]
pub struct ActiveRuns {
    runs: Mutex<HashMap<String, CancellationToken>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a room for a new run. Returns `None` when one is already active.
    pub fn begin(&self, room_id: &str) -> Option<CancellationToken> {
        let mut runs = self.runs.lock();
        if runs.contains_key(room_id) {
            return None;
        }
        let token = CancellationToken::new();
        runs.insert(room_id.to_string(), token.clone());
        Some(token)
    }

    pub fn finish(&self, room_id: &str) {
        self.runs.lock().remove(room_id);
    }

    /// Cancel a room's run. Returns false when nothing was running.
    pub fn abort(&self, room_id: &str) -> bool {
        match self.runs.lock().get(room_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub onboarding: Arc<Onboarding>,
    pub bus: Arc<EventBus>,
    pub storage: Arc<dyn Storage>,
    pub validator: Arc<dyn KeyValidator>,
    pub active: Arc<ActiveRuns>,
}

/// Inbound client frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
enum ClientFrame {
    StartProject(StartProject),
    ValidateKey(ValidateKey),
    AbortWebsiteCreation(AbortCreation),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartProject {
    room_id: String,
    user_id: String,
    ship_type: ShipType,
    message: String,
    #[serde(default)]
    images: Vec<ImageFrame>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageFrame {
    media_type: String,
    /// Base64 image bytes, sent as `file` on the wire
    file: String,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateKey {
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbortCreation {
    room_id: String,
}

impl From<StartProject> for ShipRequest {
    fn from(frame: StartProject) -> Self {
        ShipRequest {
            room_id: frame.room_id,
            user_id: frame.user_id,
            ship_type: frame.ship_type,
            message: frame.message,
            images: frame
                .images
                .into_iter()
                .map(|i| ImageUpload {
                    media_type: i.media_type,
                    data: i.file,
                    caption: i.caption,
                })
                .collect(),
            api_key_override: frame.api_key,
        }
    }
}

/// GET /ws upgrades to the event socket.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ShipEvent>(64);

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable client frame");
                let _ = out_tx
                    .send(ShipEvent::Error {
                        error: format!("Invalid frame: {}", e),
                    })
                    .await;
                continue;
            }
        };
        handle_frame(&state, &out_tx, frame).await;
    }

    drop(out_tx);
    let _ = writer.await;
}

async fn handle_frame(state: &AppState, out_tx: &mpsc::Sender<ShipEvent>, frame: ClientFrame) {
    match frame {
        ClientFrame::StartProject(start) => {
            let room_id = start.room_id.clone();
            let Some(token) = state.active.begin(&room_id) else {
                let _ = out_tx
                    .send(ShipEvent::Error {
                        error: "Website creation already in progress for this room".to_string(),
                    })
                    .await;
                return;
            };

            // Forward this room's events to the socket until the room channel
            // closes after the run.
            let mut room_rx = state.bus.subscribe(&room_id);
            let forward_tx = out_tx.clone();
            tokio::spawn(async move {
                loop {
                    match room_rx.recv().await {
                        Ok(event) => {
                            if forward_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(lagged = n, "socket fell behind room events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            let run_state = state.clone();
            let request: ShipRequest = start.into();
            tokio::spawn(async move {
                run_state.onboarding.start(request, token).await;
                run_state.active.finish(&room_id);
                run_state.bus.remove_room(&room_id);
            });
        }
        ClientFrame::ValidateKey(validate) => {
            let event = match state.validator.validate(&validate.api_key).await {
                Ok(()) => ShipEvent::ApiKeyStatus {
                    success: true,
                    message: "API key is valid".to_string(),
                    key: Some(validate.api_key),
                },
                Err(e) => ShipEvent::ApiKeyStatus {
                    success: false,
                    message: e.to_string(),
                    key: None,
                },
            };
            let _ = out_tx.send(event).await;
        }
        ClientFrame::AbortWebsiteCreation(abort) => {
            if !state.active.abort(&abort.room_id) {
                let _ = out_tx
                    .send(ShipEvent::Error {
                        error: "No active website creation for this room".to_string(),
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_project_frame_parses() {
        let json = r#"{
            "event": "startProject",
            "data": {
                "roomId": "room-1",
                "userId": "user-1",
                "shipType": "portfolio",
                "message": "Build my portfolio",
                "images": [
                    {"mediaType": "image/png", "file": "aGVsbG8=", "caption": "logo"}
                ],
                "apiKey": "sk-user"
            }
        }"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        let ClientFrame::StartProject(start) = frame else {
            panic!("expected startProject");
        };
        let request: ShipRequest = start.into();
        assert_eq!(request.room_id, "room-1");
        assert_eq!(request.ship_type, ShipType::Portfolio);
        assert_eq!(request.images.len(), 1);
        assert_eq!(request.images[0].data, "aGVsbG8=");
        assert_eq!(request.images[0].caption.as_deref(), Some("logo"));
        assert_eq!(request.api_key_override.as_deref(), Some("sk-user"));
    }

    #[test]
    fn test_start_project_minimal_fields() {
        let json = r#"{
            "event": "startProject",
            "data": {
                "roomId": "r",
                "userId": "u",
                "shipType": "landing_page",
                "message": "go"
            }
        }"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        let ClientFrame::StartProject(start) = frame else {
            panic!("expected startProject");
        };
        assert!(start.images.is_empty());
        assert!(start.api_key.is_none());
    }

    #[test]
    fn test_validate_and_abort_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event": "validateKey", "data": {"apiKey": "sk-x"}}"#)
                .unwrap();
        let ClientFrame::ValidateKey(validate) = frame else {
            panic!("expected validateKey");
        };
        assert_eq!(validate.api_key, "sk-x");

        let frame: ClientFrame = serde_json::from_str(
            r#"{"event": "abortWebsiteCreation", "data": {"roomId": "room-1"}}"#,
        )
        .unwrap();
        let ClientFrame::AbortWebsiteCreation(abort) = frame else {
            panic!("expected abort");
        };
        assert_eq!(abort.room_id, "room-1");
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"event": "selfDestruct", "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_active_runs_rejects_second_start() {
        let active = ActiveRuns::new();
        let token = active.begin("room-1").unwrap();
        assert!(active.begin("room-1").is_none());
        assert!(active.begin("room-2").is_some());

        assert!(active.abort("room-1"));
        assert!(token.is_cancelled());

        active.finish("room-1");
        assert!(!active.abort("room-1"));
        assert!(active.begin("room-1").is_some());
    }

    #[test]
    fn test_outbound_event_frame_shape() {
        let json = serde_json::to_value(ShipEvent::WebsiteDeployed { slug: "demo".into() }).unwrap();
        assert_eq!(json["event"], "websiteDeployed");
        assert_eq!(json["data"]["slug"], "demo");
    }
}
