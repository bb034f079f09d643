//! Client configuration.
//!
//! Every field is optional and falls back to the defaults below.
//!
//! | Field | Default |
//! |-------|---------|
//! | `url` | `ws://localhost:8000/ws` |
//! | `protocols` | none |
//! | `reconnect_attempts` | 10 |
//! | `reconnect_interval` | 2000 ms |
//! | `backoff_multiplier` | 1.5 |
//! | `heartbeat_interval` | 25000 ms |
//! | `message_queue_size` | 100 |
//! | `debug` | `false` |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use realtime_channels::ClientConfig;
//!
//! let config = ClientConfig::new()
//!     .with_url("wss://api.example.com/ws")
//!     .with_reconnect_attempts(3)
//!     .with_reconnect_interval(Duration::from_secs(1));
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! Configuration can also be loaded from JSON, using the same camelCase
//! keys as the server-side settings files and milliseconds for durations:
//!
//! ```
//! use realtime_channels::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{"reconnectInterval": 500, "debug": true}"#)?;
//! assert_eq!(config.reconnect_interval.as_millis(), 500);
//! # Ok::<(), realtime_channels::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Default number of automatic reconnect attempts.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// Default base reconnect delay.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(2000);

/// Default growth factor between reconnect delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(25_000);

/// Default bound of the outbound queue.
pub const DEFAULT_MESSAGE_QUEUE_SIZE: usize = 100;

// ============================================================================
// ClientConfig
// ============================================================================

/// Realtime client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Endpoint used by `connect()` and by automatic reconnects.
    pub url: String,

    /// WebSocket sub-protocols offered during the handshake.
    pub protocols: Vec<String>,

    /// Automatic reconnects allowed before giving up.
    pub reconnect_attempts: u32,

    /// Delay before the first reconnect.
    #[serde(with = "duration_ms")]
    pub reconnect_interval: Duration,

    /// Factor applied to the delay for each further attempt.
    pub backoff_multiplier: f64,

    /// Period between `ping` messages while connected.
    #[serde(with = "duration_ms")]
    pub heartbeat_interval: Duration,

    /// Messages kept while disconnected; older ones are evicted.
    pub message_queue_size: usize,

    /// Emits diagnostic logs (decode failures, reconnect scheduling).
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            protocols: Vec::new(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            message_queue_size: DEFAULT_MESSAGE_QUEUE_SIZE,
            debug: false,
        }
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - Any error from [`ClientConfig::validate`]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientConfig {
    /// Sets the endpoint URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Adds an offered sub-protocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Sets the number of automatic reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the base reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the backoff growth factor.
    #[inline]
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the outbound queue bound.
    #[inline]
    #[must_use]
    pub fn with_message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    /// Enables diagnostic logging.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not an absolute `ws://` or `wss://` URL
    /// - [`Error::Config`] for zero intervals, a zero queue size, or a
    ///   multiplier below 1.0
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.url)?;

        if self.reconnect_interval.is_zero() {
            return Err(Error::config("reconnect interval must be greater than zero"));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat interval must be greater than zero"));
        }

        if self.message_queue_size == 0 {
            return Err(Error::config("message queue size must be at least 1"));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        Ok(())
    }
}

/// Checks that `url` is an absolute WebSocket URL.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] otherwise.
pub(crate) fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e.to_string()))?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(Error::invalid_url(
            url,
            format!("scheme must be ws or wss, got {other}"),
        )),
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Durations written as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
