//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use realtime_channels::{ClientConfig, RealtimeClient, TokenStore};
//!
//! # async fn example() -> realtime_channels::Result<()> {
//! let tokens = Arc::new(TokenStore::with_token("secret"));
//!
//! let client = RealtimeClient::builder()
//!     .config(ClientConfig::new().with_url("wss://example.org/ws"))
//!     .token_provider(tokens)
//!     .build()?;
//!
//! client.connect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{Connector, WebSocketConnector};

use super::core::RealtimeClient;
use super::token::TokenProvider;

// ============================================================================
// RealtimeClientBuilder
// ============================================================================

/// Builder for a [`RealtimeClient`].
///
/// Use [`RealtimeClient::builder()`] to create one.
#[derive(Default)]
pub struct RealtimeClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl RealtimeClientBuilder {
    /// Creates a builder with the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Uses a custom transport instead of WebSocket.
    #[inline]
    #[must_use]
    pub fn connector<C: Connector>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets the source of the token sent in `auth` after each open.
    ///
    /// Without a provider no `auth` message is sent.
    #[inline]
    #[must_use]
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Validates the configuration and starts the session task.
    ///
    /// The client starts disconnected; call [`RealtimeClient::connect`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::InvalidUrl`] if the configuration is invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<RealtimeClient> {
        self.config.validate()?;

        let runtime = Handle::try_current().map_err(|_| {
            Error::config(
                "RealtimeClient must be built inside a tokio runtime.\n\
                 Example: #[tokio::main] async fn main() { ... }",
            )
        })?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        Ok(RealtimeClient::spawn(
            &runtime,
            self.config,
            connector,
            self.tokens,
        ))
    }
}

impl fmt::Debug for RealtimeClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClientBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .field("token_provider", &self.tokens.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
