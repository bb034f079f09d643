//! Transport layer.
//!
//! The client never touches sockets directly. It asks a [`Connector`] for a
//! [`Transport`] and from then on only exchanges text frames and close
//! notifications with it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   connect(url)   ┌──────────────────┐
//! │  Session task    │─────────────────►│  Connector       │
//! │                  │                  └────────┬─────────┘
//! │  send / recv /   │     Box<dyn Transport>    │
//! │  close           │◄──────────────────────────┘
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite implementation |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport over tokio-tungstenite.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::{Error, Result};

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{WebSocketConnector, WebSocketTransport};

// ============================================================================
// Constants
// ============================================================================

/// Close code for a deliberate, orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// CloseInfo
// ============================================================================

/// How a transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close status code.
    pub code: u16,
    /// Close reason sent by the peer.
    pub reason: String,
    /// `false` when the connection dropped without a closing handshake.
    pub was_clean: bool,
}

impl CloseInfo {
    /// Creates a close description.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// The connection dropped without a closing handshake.
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self::new(ABNORMAL_CLOSURE, "", false)
    }

    /// Returns `true` for a clean close with [`NORMAL_CLOSURE`].
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.was_clean && self.code == NORMAL_CLOSURE
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something the transport observed.
#[derive(Debug)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// The transport failed. A [`TransportEvent::Closed`] follows.
    Error(Error),
    /// The transport is closed and will produce nothing further.
    Closed(CloseInfo),
}

// ============================================================================
// Traits
// ============================================================================

/// An open, bidirectional text-frame connection.
#[async_trait]
pub trait Transport: Send {
    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be written.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Waits for the next event.
    ///
    /// Must be cancel-safe: the session drops this future whenever another
    /// event source fires first.
    async fn recv(&mut self) -> TransportEvent;

    /// Starts the closing handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame could not be written.
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Boxed transport handed from a connector to the session.
pub type BoxTransport = Box<dyn Transport>;

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a transport to `url`, offering `protocols`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached or rejects the
    /// handshake.
    async fn connect(&self, url: &str, protocols: &[String]) -> Result<BoxTransport>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abnormal_close() {
        let info = CloseInfo::abnormal();
        assert_eq!(info.code, ABNORMAL_CLOSURE);
        assert!(!info.was_clean);
        assert!(!info.is_normal());
    }

    #[test]
    fn test_normal_close() {
        assert!(CloseInfo::new(NORMAL_CLOSURE, "bye", true).is_normal());
        assert!(!CloseInfo::new(NORMAL_CLOSURE, "", false).is_normal());
        assert!(!CloseInfo::new(4001, "kicked", true).is_normal());
    }
}
