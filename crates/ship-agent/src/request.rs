//! Ship request types

use serde::{Deserialize, Serialize};
use ship_ai::{Content, Message};

/// What kind of website the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipType {
    Portfolio,
    LandingPage,
    EmailTemplate,
    /// Free-form request with no dedicated start tool
    Prompt,
}

impl ShipType {
    /// Human-readable label for logs and progress messages
    pub fn label(&self) -> &'static str {
        match self {
            ShipType::Portfolio => "portfolio",
            ShipType::LandingPage => "landing page",
            ShipType::EmailTemplate => "email template",
            ShipType::Prompt => "website",
        }
    }
}

/// An image the user attached to the request (base64 encoded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub media_type: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// One user-initiated generation request.
///
/// Created at "start project" receipt, immutable for the duration of the
/// conversation loop, destroyed when the loop returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipRequest {
    pub room_id: String,
    pub user_id: String,
    pub ship_type: ShipType,
    pub message: String,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_override: Option<String>,
}

impl ShipRequest {
    /// Build the opening user turn: free text plus one block per image.
    pub fn initial_message(&self) -> Message {
        let mut content = vec![Content::text(&self.message)];
        for image in &self.images {
            content.push(Content::image(&image.media_type, &image.data));
            if let Some(ref caption) = image.caption {
                content.push(Content::text(format!("Image caption: {}", caption)));
            }
        }
        Message::user_with_content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_message_text_only() {
        let request = ShipRequest {
            room_id: "room-1".into(),
            user_id: "user-1".into(),
            ship_type: ShipType::Portfolio,
            message: "Build me a portfolio".into(),
            images: vec![],
            api_key_override: None,
        };
        let msg = request.initial_message();
        assert_eq!(msg.content.len(), 1);
        assert_eq!(msg.text(), "Build me a portfolio");
    }

    #[test]
    fn test_initial_message_interleaves_images_and_captions() {
        let request = ShipRequest {
            room_id: "room-1".into(),
            user_id: "user-1".into(),
            ship_type: ShipType::LandingPage,
            message: "Use this mockup".into(),
            images: vec![ImageUpload {
                media_type: "image/png".into(),
                data: "aGVsbG8=".into(),
                caption: Some("hero section".into()),
            }],
            api_key_override: None,
        };
        let msg = request.initial_message();
        assert_eq!(msg.content.len(), 3);
        assert!(matches!(msg.content[1], Content::Image { .. }));
        assert!(msg.text().contains("hero section"));
    }

    #[test]
    fn test_ship_type_serde() {
        let t: ShipType = serde_json::from_str("\"landing_page\"").unwrap();
        assert_eq!(t, ShipType::LandingPage);
        assert_eq!(serde_json::to_string(&ShipType::Portfolio).unwrap(), "\"portfolio\"");
    }
}
