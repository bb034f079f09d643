//! Outbound and inbound envelopes.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

use super::Topic;

// ============================================================================
// Envelope
// ============================================================================

/// An application message from client to server.
///
/// # Format
///
/// ```json
/// {
///   "type": "subscribe",
///   "payload": { "channel": "alerts" },
///   "timestamp": 1700000000000,
///   "id": "1700000000000-k3j9x0a1b"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Channel the message belongs to.
    #[serde(rename = "type")]
    pub topic: Topic,

    /// Message body.
    pub payload: Value,

    /// Creation time, epoch milliseconds.
    pub timestamp: u64,

    /// Unique message id.
    pub id: MessageId,
}

impl Envelope {
    /// Creates an envelope stamped with the current time and a fresh id.
    #[must_use]
    pub fn new(topic: impl Into<Topic>, payload: Value) -> Self {
        let timestamp = now_millis();
        Self {
            topic: topic.into(),
            payload,
            timestamp,
            id: MessageId::generate(timestamp),
        }
    }

    /// Creates an envelope around a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `payload` does not serialize to JSON.
    pub fn with_payload<T>(topic: impl Into<Topic>, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self::new(topic, serde_json::to_value(payload)?))
    }

    /// Serializes to the text frame sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Heartbeat
// ============================================================================

/// Keep-alive message sent while connected.
///
/// Carries no payload and no id: `{"type":"ping","timestamp":...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    topic: Topic,
    /// Send time, epoch milliseconds.
    pub timestamp: u64,
}

impl Heartbeat {
    /// Creates a heartbeat stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            topic: Topic::Ping,
            timestamp: now_millis(),
        }
    }

    /// Serializes to the text frame sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on serialization failure.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// InboundEnvelope
// ============================================================================

/// A decoded message from server to client.
///
/// Decoding only requires a JSON object with a string `type`. The full
/// object is kept in `raw` for wildcard handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    /// Channel parsed from `type`.
    pub topic: Topic,

    /// The `payload` field, `Null` when absent.
    pub payload: Value,

    /// The whole decoded object.
    pub raw: Value,
}

impl InboundEnvelope {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not JSON
    /// - [`Error::Protocol`] if it is not an object with a string `type`
    pub fn decode(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        Self::from_value(raw)
    }

    /// Validates an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `raw` is not an object with a string `type`.
    pub fn from_value(raw: Value) -> Result<Self> {
        let object: &Map<String, Value> = raw
            .as_object()
            .ok_or_else(|| Error::protocol("envelope is not a JSON object"))?;

        let topic = object
            .get("type")
            .and_then(Value::as_str)
            .map(Topic::from)
            .ok_or_else(|| Error::protocol("envelope has no string 'type' field"))?;

        let payload = object.get("payload").cloned().unwrap_or(Value::Null);

        Ok(Self {
            topic,
            payload,
            raw,
        })
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
