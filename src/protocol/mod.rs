//! Wire protocol.
//!
//! Every frame is a JSON text message. Application messages travel in an
//! envelope whose `type` names the channel they belong to.
//!
//! # Message Types
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`Envelope`] | Client → Server | `{type, payload, timestamp, id}` |
//! | [`Heartbeat`] | Client → Server | `{type: "ping", timestamp}` |
//! | [`InboundEnvelope`] | Server → Client | `{type, payload, ...}` |
//!
//! # Control Messages
//!
//! | `type` | Payload |
//! |--------|---------|
//! | `auth` | [`AuthPayload`] |
//! | `subscribe` | [`SubscribePayload`] |
//! | `chat_message` | [`ChatMessagePayload`] |
//! | `join_room`, `leave_room` | [`RoomPayload`] |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `control` | Payloads of control messages |
//! | `envelope` | Outbound and inbound envelopes |
//! | `topic` | Channel names as a typed union |

// ============================================================================
// Submodules
// ============================================================================

/// Control message payloads.
pub mod control;

/// Outbound and inbound envelopes.
pub mod envelope;

/// Channel names.
pub mod topic;

// ============================================================================
// Re-exports
// ============================================================================

pub use control::{AuthPayload, ChatMessagePayload, RoomPayload, SubscribePayload};
pub use envelope::{Envelope, Heartbeat, InboundEnvelope};
pub use topic::Topic;
