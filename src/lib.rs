//! Realtime Channels - multiplexed pub/sub over one WebSocket.
//!
//! This library keeps a single connection to a realtime server and carries
//! many logical channels (patient vitals, alerts, notifications, chat rooms)
//! over it.
//!
//! # Architecture
//!
//! - **Client handle**: cheap to clone, never blocks, never fails on network errors
//! - **Session task**: one tokio task owns the transport, heartbeat and reconnect timer
//! - **Transport seam**: [`Connector`] / [`Transport`] traits, WebSocket by default
//!
//! Behavior:
//!
//! - Messages sent while disconnected wait in a bounded FIFO queue
//! - Unclean closes reconnect with exponential backoff (`interval * 1.5^n`)
//! - A `ping` heartbeat runs while connected; `pong` replies are swallowed
//! - Handlers are registered per channel, or on `*` for every message
//!
//! # Quick Start
//!
//! ```no_run
//! use realtime_channels::{ClientConfig, RealtimeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = RealtimeClient::new(
//!         ClientConfig::new().with_url("ws://localhost:8000/ws"),
//!     )?;
//!
//!     client.on_connect(|| println!("connected"));
//!     client.subscribe_to_alerts(|alert| println!("alert: {alert}"));
//!     client.subscribe_to_vitals("patient-42", |vitals| println!("vitals: {vitals}"));
//!
//!     client.connect();
//!     tokio::signal::ctrl_c().await.ok();
//!
//!     client.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`RealtimeClient`], builder, handlers and session |
//! | [`config`] | [`ClientConfig`] and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Transport traits and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Realtime client: handle, builder, handlers and session loop.
///
/// Use [`RealtimeClient::builder()`] to create a client.
pub mod client;

/// Client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers keep message ids and subscription tokens apart.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// Transport layer.
///
/// Implement [`Connector`] to run the client over something other than
/// WebSocket.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    Backoff, ConnectionState, ErrorHandler, LifecycleHandler, MessageHandler, RealtimeClient,
    RealtimeClientBuilder, Subscription, TokenProvider, TokenStore,
};

// Configuration
pub use config::ClientConfig;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MessageId, SubscriptionId};

// Protocol types
pub use protocol::{Envelope, Heartbeat, InboundEnvelope, Topic};

// Transport types
pub use transport::{
    BoxTransport, CloseInfo, Connector, Transport, TransportEvent, WebSocketConnector,
};
