//! Realtime channel client.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐  Command (mpsc)  ┌──────────────────────┐
//! │ RealtimeClient     │─────────────────►│ Session task         │
//! │ (Clone handles)    │                  │  transport, timers   │
//! └─────────┬──────────┘                  └──────────┬───────────┘
//!           │ register / inspect                     │ dispatch / flush
//!           ▼                                        ▼
//!      ┌─────────────────────────────────────────────────────┐
//!      │ Shared: Registry, OutboundQueue, state, attempts    │
//!      └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect delay policy |
//! | `builder` | [`RealtimeClientBuilder`] |
//! | `channels` | Vitals, alerts, notifications and chat helpers |
//! | `core` | [`RealtimeClient`] handle |
//! | `queue` | Bounded FIFO of frames written on the next open |
//! | `registry` | Handler tables and dispatch |
//! | `session` | Connection event loop |
//! | `state` | [`ConnectionState`] |
//! | `token` | [`TokenProvider`] and [`TokenStore`] |

// ============================================================================
// Submodules
// ============================================================================

mod backoff;
mod builder;
mod channels;
mod core;
mod queue;
mod registry;
mod session;
mod state;
mod token;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::Backoff;
pub use builder::RealtimeClientBuilder;
pub use core::RealtimeClient;
pub use registry::{ErrorHandler, LifecycleHandler, MessageHandler, Subscription};
pub use state::ConnectionState;
pub use token::{TokenProvider, TokenStore};
