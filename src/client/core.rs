//! The client handle.
//!
//! A [`RealtimeClient`] is a cheap clone around shared state and the command
//! sender of its session task. Every method returns immediately; network
//! work happens on the session task.
//!
//! # Example
//!
//! ```no_run
//! use realtime_channels::{RealtimeClient, Topic};
//! use serde_json::json;
//!
//! # async fn example() -> realtime_channels::Result<()> {
//! let client = RealtimeClient::builder()
//!     .url("ws://localhost:8000/ws")
//!     .build()?;
//!
//! let alerts = client.on(Topic::Alert, |payload| {
//!     println!("alert: {payload}");
//! });
//!
//! client.connect();
//! client.send("subscribe", json!({ "channel": "alerts" }));
//!
//! alerts.unsubscribe();
//! client.destroy();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::{ClientConfig, validate_url};
use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{Envelope, Topic};
use crate::transport::Connector;

use super::builder::RealtimeClientBuilder;
use super::registry::Subscription;
use super::session::{Command, Session, Shared};
use super::state::ConnectionState;
use super::token::TokenProvider;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a client.
struct ClientInner {
    config: Arc<ClientConfig>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

// ============================================================================
// RealtimeClient
// ============================================================================

/// A channel client multiplexing many subscriptions over one connection.
///
/// Clones share the same session. The session task stops on
/// [`destroy()`](Self::destroy) or when the last clone is dropped.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.url())
            .field("state", &self.state())
            .field("queued", &self.queued_len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RealtimeClient - Construction
// ============================================================================

impl RealtimeClient {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RealtimeClientBuilder {
        RealtimeClientBuilder::new()
    }

    /// Creates a WebSocket client from a configuration.
    ///
    /// # Errors
    ///
    /// See [`RealtimeClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub(crate) fn spawn(
        runtime: &Handle,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Self {
        let config = Arc::new(config);
        let shared = Arc::new(Shared::new(&config));
        let (commands, receiver) = mpsc::unbounded_channel();

        let session = Session::new(Arc::clone(&config), connector, tokens, Arc::clone(&shared));
        runtime.spawn(session.run(receiver));

        debug!(url = %config.url, "Realtime client created");

        Self {
            inner: Arc::new(ClientInner {
                config,
                shared,
                commands,
            }),
        }
    }
}

// ============================================================================
// RealtimeClient - Connection
// ============================================================================

impl RealtimeClient {
    /// Opens the connection to the current URL.
    ///
    /// Does nothing while a transport is open or opening. Failures are
    /// reported to [`on_error`](Self::on_error) handlers and retried with
    /// backoff.
    pub fn connect(&self) {
        self.command(Command::Connect(None));
    }

    /// Opens the connection to `url`, which later reconnects reuse.
    ///
    /// While a transport is open or opening the URL is only stored; it takes
    /// effect on the next connect or reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not a `ws://` or `wss://` URL.
    pub fn connect_to(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        validate_url(&url)?;
        self.command(Command::Connect(Some(url)));
        Ok(())
    }

    /// Closes the connection with code 1000 and cancels any reconnect.
    ///
    /// Handlers and queued messages are kept; a later
    /// [`connect()`](Self::connect) resumes.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Tears the client down for good.
    ///
    /// Handlers and queued messages are cleared at once, the connection is
    /// closed and the session task stops. Later calls on any clone are
    /// no-ops.
    pub fn destroy(&self) {
        let shared = &self.inner.shared;
        if shared.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        shared.registry.lock().clear();
        shared.queue.lock().clear();
        shared.state.set(ConnectionState::Destroyed);

        // Fails only when the session already stopped.
        let _ = self.inner.commands.send(Command::Destroy);
        debug!("Realtime client destroyed");
    }

    fn command(&self, command: Command) {
        if self.inner.shared.is_destroyed() {
            trace!(?command, "Client destroyed, command ignored");
            return;
        }
        if self.inner.commands.send(command).is_err() {
            debug!("Session task stopped, command dropped");
        }
    }
}

// ============================================================================
// RealtimeClient - Messaging
// ============================================================================

impl RealtimeClient {
    /// Sends a message, or queues it until the next open.
    ///
    /// When the queue is full the oldest queued message is dropped.
    pub fn send(&self, topic: impl Into<Topic>, payload: Value) {
        let envelope = Envelope::new(topic, payload);
        match envelope.to_text() {
            Ok(frame) => self.command(Command::Send(frame)),
            Err(e) => warn!(topic = %envelope.topic, error = %e, "Failed to encode message"),
        }
    }

    /// Sends a message with a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `payload` does not serialize. Delivery
    /// problems are never reported here.
    pub fn send_payload<T>(&self, topic: impl Into<Topic>, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let frame = Envelope::with_payload(topic, payload)?.to_text()?;
        self.command(Command::Send(frame));
        Ok(())
    }

    /// Registers a handler for messages of `topic`.
    ///
    /// Typed handlers receive the message `payload`. Handlers on
    /// [`Topic::Wildcard`] receive the whole message. `pong` reaches nobody.
    pub fn on<F>(&self, topic: impl Into<Topic>, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let topic = topic.into();
        self.register(|registry| registry.add_message(topic, Arc::new(handler)))
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.shared.registry.lock().remove(id)
    }

    /// Registers a handler run after every successful open.
    pub fn on_connect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(|registry| registry.add_connect(Arc::new(handler)))
    }

    /// Registers a handler run whenever an open connection closes.
    pub fn on_disconnect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(|registry| registry.add_disconnect(Arc::new(handler)))
    }

    /// Registers a handler for connection and transport errors.
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.register(|registry| registry.add_error(Arc::new(handler)))
    }

    fn register(
        &self,
        add: impl FnOnce(&mut super::registry::Registry) -> SubscriptionId,
    ) -> Subscription {
        let registry = &self.inner.shared.registry;

        if self.inner.shared.is_destroyed() {
            trace!("Client destroyed, handler not registered");
            return Subscription::new(SubscriptionId::next(), registry);
        }

        let id = add(&mut *registry.lock());
        Subscription::new(id, registry)
    }
}

// ============================================================================
// RealtimeClient - Introspection
// ============================================================================

impl RealtimeClient {
    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state.get()
    }

    /// Returns `true` while a transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns `true` once [`destroy()`](Self::destroy) ran or the session
    /// task stopped.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.shared.is_destroyed()
    }

    /// Returns the number of reconnects scheduled since the last open.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.attempts.load(Ordering::Acquire)
    }

    /// Returns the number of messages waiting for the next open.
    #[inline]
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.shared.queue.lock().len()
    }

    /// Returns the number of registered handlers of every kind.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.shared.registry.lock().len()
    }

    /// Returns the URL used by the next connect.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.shared.url.lock().clone()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn client() -> RealtimeClient {
        RealtimeClient::new(ClientConfig::default()).expect("build")
    }

    /// Lets the session task drain its command channel.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_send_while_disconnected_queues() {
        let client = client();
        client.send("alert", json!({ "n": 1 }));
        client.send("alert", json!({ "n": 2 }));

        settle().await;
        assert_eq!(client.queued_len(), 2);
    }

    #[tokio::test]
    async fn test_connect_to_rejects_bad_url() {
        let client = client();
        let err = client.connect_to("ftp://example.org").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
        assert_eq!(client.url(), crate::config::DEFAULT_URL);
    }

    #[tokio::test]
    async fn test_on_and_off() {
        let client = client();
        let subscription = client.on("alert", |_| {});
        let _other = client.on(Topic::Wildcard, |_| {});
        assert_eq!(client.handler_count(), 2);

        assert!(client.off(subscription.id()));
        assert!(!client.off(subscription.id()));
        assert_eq!(client.handler_count(), 1);
    }

    #[tokio::test]
    async fn test_destroy_clears_everything() {
        let client = client();
        client.on("alert", |_| {});
        client.on_connect(|| {});
        client.send("alert", json!({}));
        settle().await;

        client.destroy();

        assert!(client.is_destroyed());
        assert_eq!(client.state(), ConnectionState::Destroyed);
        assert_eq!(client.handler_count(), 0);
        assert_eq!(client.queued_len(), 0);

        client.send("alert", json!({}));
        client.connect();
        client.destroy();
        settle().await;
        assert_eq!(client.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_register_after_destroy_is_inert() {
        let client = client();
        client.destroy();

        let subscription = client.on("alert", |_| {});
        assert_eq!(client.handler_count(), 0);
        assert!(!subscription.unsubscribe());
    }

    #[tokio::test]
    async fn test_clones_share_session() {
        let first = client();
        let second = first.clone();

        second.send("alert", json!({}));
        settle().await;
        assert_eq!(first.queued_len(), 1);

        first.destroy();
        assert!(second.is_destroyed());
    }
}
