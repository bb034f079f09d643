//! Channel helpers for the clinical domain.
//!
//! Each `subscribe_to_*` method tells the server to start routing a channel
//! and registers a handler for the matching inbound topic:
//!
//! | Method | Subscribe channel | Inbound topic |
//! |--------|-------------------|---------------|
//! | [`subscribe_to_vitals`](RealtimeClient::subscribe_to_vitals) | `vitals:<id>` | `vitals:<id>` |
//! | [`subscribe_to_alerts`](RealtimeClient::subscribe_to_alerts) | `alerts` | `alert` |
//! | [`subscribe_to_notifications`](RealtimeClient::subscribe_to_notifications) | `notifications` | `notification` |
//! | [`subscribe_to_chat`](RealtimeClient::subscribe_to_chat) | `chat:<id>` | `chat:<id>` |
//!
//! The returned [`Subscription`] only removes the local handler; no
//! `unsubscribe` message is sent.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::protocol::{ChatMessagePayload, RoomPayload, SubscribePayload, Topic};

use super::core::RealtimeClient;
use super::registry::Subscription;

// ============================================================================
// Subscriptions
// ============================================================================

impl RealtimeClient {
    /// Follows a patient's vital signs.
    pub fn subscribe_to_vitals<F>(&self, patient_id: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.post(Topic::Subscribe, &SubscribePayload::vitals(patient_id));
        self.on(Topic::vitals(patient_id), handler)
    }

    /// Follows clinical alerts.
    pub fn subscribe_to_alerts<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.post(Topic::Subscribe, &SubscribePayload::alerts());
        self.on(Topic::Alert, handler)
    }

    /// Follows notifications for the authenticated user.
    pub fn subscribe_to_notifications<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.post(Topic::Subscribe, &SubscribePayload::notifications());
        self.on(Topic::Notification, handler)
    }

    /// Follows a chat room.
    pub fn subscribe_to_chat<F>(&self, room_id: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.post(Topic::Subscribe, &SubscribePayload::chat(room_id));
        self.on(Topic::chat(room_id), handler)
    }
}

// ============================================================================
// Chat
// ============================================================================

impl RealtimeClient {
    /// Posts a message to a chat room.
    ///
    /// `attachments` are passed to the server untouched.
    pub fn send_chat_message(
        &self,
        room_id: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<Value>,
    ) {
        let payload = ChatMessagePayload {
            room_id: room_id.into(),
            content: content.into(),
            attachments,
        };
        self.post(Topic::ChatMessage, &payload);
    }

    /// Joins a chat room.
    pub fn join_room(&self, room_id: impl Into<String>) {
        self.post(
            Topic::JoinRoom,
            &RoomPayload {
                room_id: room_id.into(),
            },
        );
    }

    /// Leaves a chat room.
    pub fn leave_room(&self, room_id: impl Into<String>) {
        self.post(
            Topic::LeaveRoom,
            &RoomPayload {
                room_id: room_id.into(),
            },
        );
    }

    fn post<T: Serialize>(&self, topic: Topic, payload: &T) {
        if let Err(e) = self.send_payload(topic, payload) {
            warn!(error = %e, "Failed to encode control message");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
