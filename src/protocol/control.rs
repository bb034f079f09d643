//! Control message payloads.
//!
//! These ride inside a normal [`Envelope`](super::Envelope); the server
//! interprets them by `type`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Subscription channel for clinical alerts.
pub const ALERTS_CHANNEL: &str = "alerts";

/// Subscription channel for user notifications.
pub const NOTIFICATIONS_CHANNEL: &str = "notifications";

// ============================================================================
// Payloads
// ============================================================================

/// Payload of an `auth` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Bearer token issued to the embedding application.
    pub token: String,
}

/// Payload of a `subscribe` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    /// Channel the server should start routing to this client.
    pub channel: String,
}

impl SubscribePayload {
    /// Subscribes to a patient's vital signs.
    #[must_use]
    pub fn vitals(patient_id: &str) -> Self {
        Self {
            channel: format!("vitals:{patient_id}"),
        }
    }

    /// Subscribes to clinical alerts.
    #[must_use]
    pub fn alerts() -> Self {
        Self {
            channel: ALERTS_CHANNEL.to_string(),
        }
    }

    /// Subscribes to user notifications.
    #[must_use]
    pub fn notifications() -> Self {
        Self {
            channel: NOTIFICATIONS_CHANNEL.to_string(),
        }
    }

    /// Subscribes to a chat room.
    #[must_use]
    pub fn chat(room_id: &str) -> Self {
        Self {
            channel: format!("chat:{room_id}"),
        }
    }
}

/// Payload of a `chat_message` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    /// Target room.
    pub room_id: String,
    /// Message text.
    pub content: String,
    /// Attachment descriptors, passed through untouched.
    #[serde(default)]
    pub attachments: Vec<Value>,
}

/// Payload of `join_room` and `leave_room` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    /// Room concerned.
    pub room_id: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_subscribe_channels() {
        assert_eq!(SubscribePayload::vitals("p1").channel, "vitals:p1");
        assert_eq!(SubscribePayload::alerts().channel, "alerts");
        assert_eq!(SubscribePayload::notifications().channel, "notifications");
        assert_eq!(SubscribePayload::chat("r9").channel, "chat:r9");
    }

    #[test]
    fn test_chat_message_uses_camel_case() {
        let payload = ChatMessagePayload {
            room_id: "r1".into(),
            content: "hello".into(),
            attachments: vec![json!({ "name": "scan.png" })],
        };

        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({
                "roomId": "r1",
                "content": "hello",
                "attachments": [{ "name": "scan.png" }]
            })
        );
    }

    #[test]
    fn test_room_payload() {
        let payload = RoomPayload {
            room_id: "oncology".into(),
        };
        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({ "roomId": "oncology" })
        );
    }
}
