//! Events emitted to a room during an onboarding run

use serde::{Deserialize, Serialize};
use ship_ai::Message;

/// Events broadcast to all listeners in a request's room.
///
/// Serialized names match the client protocol (`newMessage`, `needMoreInfo`,
/// ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ShipEvent {
    /// Conversation history snapshot after an append
    NewMessage { conversation: Vec<Message> },

    /// The model ended its turn without a tool call and needs user input
    NeedMoreInfo { message: String },

    /// Progress note while a tool runs
    Progress { message: String },

    /// The site was deployed under this slug
    WebsiteDeployed { slug: String },

    /// The run failed; the client shows a toast
    Error { error: String },

    /// Quota exhausted; the client shows the payment modal
    ShowPaymentOptions { error: String },

    /// The run was cancelled by the client
    CreationAborted { message: String },

    /// Result of validating a user-supplied API key
    ApiKeyStatus {
        success: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
}

impl ShipEvent {
    /// Whether this event ends the run from the client's point of view
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipEvent::WebsiteDeployed { .. }
                | ShipEvent::Error { .. }
                | ShipEvent::ShowPaymentOptions { .. }
                | ShipEvent::CreationAborted { .. }
                | ShipEvent::NeedMoreInfo { .. }
        )
    }

    /// The wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            ShipEvent::NewMessage { .. } => "newMessage",
            ShipEvent::NeedMoreInfo { .. } => "needMoreInfo",
            ShipEvent::Progress { .. } => "progress",
            ShipEvent::WebsiteDeployed { .. } => "websiteDeployed",
            ShipEvent::Error { .. } => "error",
            ShipEvent::ShowPaymentOptions { .. } => "showPaymentOptions",
            ShipEvent::CreationAborted { .. } => "creationAborted",
            ShipEvent::ApiKeyStatus { .. } => "apiKeyStatus",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let event = ShipEvent::WebsiteDeployed { slug: "my-site".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "websiteDeployed");
        assert_eq!(json["data"]["slug"], "my-site");
    }

    #[test]
    fn test_api_key_status_omits_missing_key() {
        let event = ShipEvent::ApiKeyStatus {
            success: false,
            message: "invalid key".into(),
            key: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"].get("key").is_none());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ShipEvent::WebsiteDeployed { slug: "s".into() }.is_terminal());
        assert!(ShipEvent::CreationAborted { message: "m".into() }.is_terminal());
        assert!(!ShipEvent::Progress { message: "m".into() }.is_terminal());
        assert!(!ShipEvent::NewMessage { conversation: vec![] }.is_terminal());
    }
}
