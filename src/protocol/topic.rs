//! Channel names.
//!
//! The `type` field of an envelope doubles as the channel it is routed on.
//! Known channels get their own variant; anything else is kept verbatim in
//! [`Topic::Other`] so newer servers do not break older clients.
//!
//! | Wire string | Variant |
//! |-------------|---------|
//! | `*` | [`Topic::Wildcard`] |
//! | `vitals:<patientId>` | [`Topic::Vitals`] |
//! | `alert` | [`Topic::Alert`] |
//! | `notification` | [`Topic::Notification`] |
//! | `chat:<roomId>` | [`Topic::Chat`] |
//! | `ping` / `pong` | [`Topic::Ping`] / [`Topic::Pong`] |
//! | `auth`, `subscribe`, `chat_message`, `join_room`, `leave_room` | control variants |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

const WILDCARD: &str = "*";
const PING: &str = "ping";
const PONG: &str = "pong";
const AUTH: &str = "auth";
const SUBSCRIBE: &str = "subscribe";
const ALERT: &str = "alert";
const NOTIFICATION: &str = "notification";
const CHAT_MESSAGE: &str = "chat_message";
const JOIN_ROOM: &str = "join_room";
const LEAVE_ROOM: &str = "leave_room";
const VITALS_PREFIX: &str = "vitals:";
const CHAT_PREFIX: &str = "chat:";

// ============================================================================
// Topic
// ============================================================================

/// A channel name, parsed from the envelope `type` string.
///
/// Parsing never fails and `Display` reproduces the original string, so a
/// `Topic` can be used anywhere the raw string was.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Topic {
    /// Matches every dispatched message. Only meaningful for handlers.
    Wildcard,
    /// Client heartbeat.
    Ping,
    /// Server heartbeat reply. Never dispatched.
    Pong,
    /// Authentication request.
    Auth,
    /// Channel subscription request.
    Subscribe,
    /// Clinical alerts.
    Alert,
    /// User notifications.
    Notification,
    /// Vital-sign stream of one patient.
    Vitals(String),
    /// Messages of one chat room.
    Chat(String),
    /// Outgoing chat message.
    ChatMessage,
    /// Room join request.
    JoinRoom,
    /// Room leave request.
    LeaveRoom,
    /// Any other channel.
    Other(String),
}

impl Topic {
    /// Vital-sign channel of `patient_id`.
    #[inline]
    #[must_use]
    pub fn vitals(patient_id: impl Into<String>) -> Self {
        Self::Vitals(patient_id.into())
    }

    /// Chat channel of `room_id`.
    #[inline]
    #[must_use]
    pub fn chat(room_id: impl Into<String>) -> Self {
        Self::Chat(room_id.into())
    }

    /// Returns `true` for the wildcard topic.
    #[inline]
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Returns `true` if messages on this topic are never dispatched.
    #[inline]
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Pong)
    }

    fn parse(raw: &str) -> Self {
        match raw {
            WILDCARD => Self::Wildcard,
            PING => Self::Ping,
            PONG => Self::Pong,
            AUTH => Self::Auth,
            SUBSCRIBE => Self::Subscribe,
            ALERT => Self::Alert,
            NOTIFICATION => Self::Notification,
            CHAT_MESSAGE => Self::ChatMessage,
            JOIN_ROOM => Self::JoinRoom,
            LEAVE_ROOM => Self::LeaveRoom,
            _ => {
                if let Some(patient_id) = raw.strip_prefix(VITALS_PREFIX) {
                    Self::Vitals(patient_id.to_string())
                } else if let Some(room_id) = raw.strip_prefix(CHAT_PREFIX) {
                    Self::Chat(room_id.to_string())
                } else {
                    Self::Other(raw.to_string())
                }
            }
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str(WILDCARD),
            Self::Ping => f.write_str(PING),
            Self::Pong => f.write_str(PONG),
            Self::Auth => f.write_str(AUTH),
            Self::Subscribe => f.write_str(SUBSCRIBE),
            Self::Alert => f.write_str(ALERT),
            Self::Notification => f.write_str(NOTIFICATION),
            Self::ChatMessage => f.write_str(CHAT_MESSAGE),
            Self::JoinRoom => f.write_str(JOIN_ROOM),
            Self::LeaveRoom => f.write_str(LEAVE_ROOM),
            Self::Vitals(patient_id) => write!(f, "{VITALS_PREFIX}{patient_id}"),
            Self::Chat(room_id) => write!(f, "{CHAT_PREFIX}{room_id}"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for Topic {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Topic {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&String> for Topic {
    fn from(raw: &String) -> Self {
        Self::parse(raw)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_topics() {
        assert_eq!(Topic::from("*"), Topic::Wildcard);
        assert_eq!(Topic::from("pong"), Topic::Pong);
        assert_eq!(Topic::from("alert"), Topic::Alert);
        assert_eq!(Topic::from("notification"), Topic::Notification);
        assert_eq!(Topic::from("join_room"), Topic::JoinRoom);
    }

    #[test]
    fn test_parse_parameterized_topics() {
        assert_eq!(Topic::from("vitals:p-17"), Topic::vitals("p-17"));
        assert_eq!(Topic::from("chat:room-3"), Topic::chat("room-3"));
    }

    #[test]
    fn test_unknown_topic_kept_verbatim() {
        let topic = Topic::from("bed_status");
        assert_eq!(topic, Topic::Other("bed_status".to_string()));
        assert_eq!(topic.to_string(), "bed_status");
    }

    #[test]
    fn test_display_matches_wire_string() {
        for raw in ["*", "ping", "subscribe", "vitals:42", "chat:ward-b", "chat_message", "x:y"] {
            assert_eq!(Topic::from(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_reserved_and_wildcard() {
        assert!(Topic::Pong.is_reserved());
        assert!(!Topic::Ping.is_reserved());
        assert!(Topic::Wildcard.is_wildcard());
        assert!(!Topic::Alert.is_wildcard());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Topic::vitals("9")).expect("serialize");
        assert_eq!(json, r#""vitals:9""#);

        let topic: Topic = serde_json::from_str(r#""chat:lobby""#).expect("deserialize");
        assert_eq!(topic, Topic::chat("lobby"));
    }
}
