//! Connection state shared between the session task and client handles.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// ConnectionState
// ============================================================================

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No transport and no retry pending.
    Disconnected = 0,
    /// A transport is being opened.
    Connecting = 1,
    /// A transport is open.
    Connected = 2,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting = 3,
    /// `destroy()` was called; terminal.
    Destroyed = 4,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Destroyed,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// AtomicConnectionState
// ============================================================================

/// Lock-free cell holding a [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub(crate) const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores `state` unless the cell already reached `Destroyed`.
    #[inline]
    pub(crate) fn set(&self, state: ConnectionState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::Destroyed as u8).then_some(state as u8)
            });
    }
}

// ============================================================================
// Tests
// ============================================================================
