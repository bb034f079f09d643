//! Session event loop.
//!
//! One tokio task owns the transport and every timer. It reacts to five
//! event sources, one at a time:
//!
//! | Source | Reaction |
//! |--------|----------|
//! | Client command | connect, disconnect, send, destroy |
//! | Pending connect | open bookkeeping, or error + reconnect |
//! | Transport event | dispatch, error notification, close handling |
//! | Heartbeat tick | send `ping` |
//! | Reconnect timer | start the next connect attempt |
//!
//! Because every outbound frame goes through the command channel and the
//! task handles one event at a time, queued frames are always written
//! before frames sent after them.
//!
//! # Open Sequence
//!
//! 1. Reset the attempt counter
//! 2. Start the heartbeat (first `ping` one interval later)
//! 3. Send `auth` if a token is available
//! 4. Flush the outbound queue
//! 5. Notify connect handlers

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{AuthPayload, Envelope, Heartbeat, InboundEnvelope, Topic};
use crate::transport::{BoxTransport, CloseInfo, Connector, NORMAL_CLOSURE, TransportEvent};

use super::backoff::Backoff;
use super::queue::OutboundQueue;
use super::registry::{self, Registry};
use super::state::{AtomicConnectionState, ConnectionState};
use super::token::TokenProvider;

// ============================================================================
// Constants
// ============================================================================

/// Close reason sent on `disconnect()`.
pub(crate) const CLIENT_DISCONNECT_REASON: &str = "Client disconnect";

// ============================================================================
// Types
// ============================================================================

type PendingConnect = BoxFuture<'static, Result<BoxTransport>>;

/// Requests from client handles to the session task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Open a transport, optionally to a new URL.
    Connect(Option<String>),
    /// Close intentionally.
    Disconnect,
    /// Write or queue a serialized frame.
    Send(String),
    /// Close and stop the task.
    Destroy,
}

// ============================================================================
// Shared
// ============================================================================

/// State visible to both the session task and client handles.
pub(crate) struct Shared {
    pub(crate) registry: Arc<Mutex<Registry>>,
    pub(crate) queue: Mutex<OutboundQueue>,
    pub(crate) state: AtomicConnectionState,
    pub(crate) attempts: AtomicU32,
    pub(crate) destroyed: AtomicBool,
    pub(crate) url: Mutex<String>,
}

impl Shared {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            queue: Mutex::new(OutboundQueue::new(config.message_queue_size)),
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            destroyed: AtomicBool::new(false),
            url: Mutex::new(config.url.clone()),
        }
    }

    #[inline]
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Session
// ============================================================================

/// The connection session driven by [`Session::run`].
pub(crate) struct Session {
    config: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
    tokens: Option<Arc<dyn TokenProvider>>,
    shared: Arc<Shared>,
    backoff: Backoff,
    /// Open transport, if any.
    transport: Option<BoxTransport>,
    /// Connect attempt in flight, if any.
    pending: Option<PendingConnect>,
    /// Running only while `transport` is open.
    heartbeat: Option<Interval>,
    /// Armed only while waiting to retry.
    reconnect: Option<Pin<Box<Sleep>>>,
    intentional_close: bool,
    attempts: u32,
}

impl Session {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        connector: Arc<dyn Connector>,
        tokens: Option<Arc<dyn TokenProvider>>,
        shared: Arc<Shared>,
    ) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            config,
            connector,
            tokens,
            shared,
            backoff,
            transport: None,
            pending: None,
            heartbeat: None,
            reconnect: None,
            intentional_close: false,
            attempts: 0,
        }
    }

    /// Runs until `Destroy` arrives or every client handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        trace!("Session task started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect(url)) => self.connect(url),
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::Send(frame)) => self.send(frame).await,
                    Some(Command::Destroy) | None => break,
                },

                result = wait_connect(&mut self.pending) => {
                    self.pending = None;
                    match result {
                        Ok(transport) => self.on_open(transport).await,
                        Err(error) => self.on_connect_failed(error),
                    }
                }

                event = wait_event(&mut self.transport) => self.on_event(event),

                () = wait_tick(&mut self.heartbeat) => self.send_heartbeat().await,

                () = wait_timer(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.connect(None);
                }
            }
        }

        self.destroy().await;
        trace!("Session task exiting");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn connect(&mut self, url: Option<String>) {
        // Stored even when ignored below, so the next reconnect uses it.
        if let Some(url) = url {
            *self.shared.url.lock() = url;
        }

        if self.transport.is_some() || self.pending.is_some() {
            trace!("Transport already open or opening, connect ignored");
            return;
        }

        let url = self.shared.url.lock().clone();

        self.intentional_close = false;
        self.reconnect = None;
        self.shared.state.set(ConnectionState::Connecting);

        debug!(%url, attempt = self.attempts, "Opening transport");

        let connector = Arc::clone(&self.connector);
        let protocols = self.config.protocols.clone();
        self.pending = Some(Box::pin(async move {
            connector.connect(&url, &protocols).await
        }));
    }

    async fn disconnect(&mut self) {
        self.intentional_close = true;
        self.heartbeat = None;
        self.reconnect = None;
        self.pending = None;
        self.set_attempts(0);

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close(NORMAL_CLOSURE, CLIENT_DISCONNECT_REASON).await {
                debug!(error = %e, "Close handshake failed");
            }
            self.shared.state.set(ConnectionState::Disconnected);
            info!("Disconnected");
            registry::notify_disconnect(&self.shared.registry);
        }

        self.shared.state.set(ConnectionState::Disconnected);
    }

    async fn send(&mut self, frame: String) {
        if self.shared.is_destroyed() {
            trace!("Client destroyed, frame dropped");
            return;
        }

        let must_queue = self.transport.is_none() || !self.shared.queue.lock().is_empty();
        if must_queue {
            self.enqueue(frame);
            self.flush_queue().await;
            return;
        }

        if let Some(transport) = self.transport.as_mut()
            && let Err(e) = transport.send(frame.clone()).await
        {
            warn!(error = %e, "Send failed, frame queued");
            self.enqueue(frame);
        }
    }

    async fn destroy(&mut self) {
        self.disconnect().await;
        self.shared.registry.lock().clear();
        self.shared.queue.lock().clear();
        self.shared.destroyed.store(true, Ordering::Release);
        self.shared.state.set(ConnectionState::Destroyed);
        debug!("Session destroyed");
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    async fn on_open(&mut self, transport: BoxTransport) {
        self.transport = Some(transport);
        self.set_attempts(0);
        self.shared.state.set(ConnectionState::Connected);

        info!(url = %self.shared.url.lock(), "Connected");

        self.start_heartbeat();
        self.authenticate().await;
        self.flush_queue().await;
        registry::notify_connect(&self.shared.registry);
    }

    fn on_connect_failed(&mut self, error: Error) {
        self.shared.state.set(ConnectionState::Disconnected);
        warn!(error = %error, "Failed to open transport");
        registry::notify_error(&self.shared.registry, &error);
        self.schedule_reconnect();
    }

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.on_message(&text),

            TransportEvent::Error(error) => {
                warn!(error = %error, "Transport error");
                registry::notify_error(&self.shared.registry, &error);
            }

            TransportEvent::Closed(info) => self.on_closed(info),
        }
    }

    fn on_message(&self, text: &str) {
        match InboundEnvelope::decode(text) {
            Ok(envelope) => {
                let delivered = registry::dispatch(&self.shared.registry, &envelope);
                trace!(topic = %envelope.topic, delivered, "Message dispatched");
            }
            Err(error) => {
                if self.config.debug {
                    debug!(error = %error, len = text.len(), "Dropping undecodable message");
                }
            }
        }
    }

    fn on_closed(&mut self, info: CloseInfo) {
        self.transport = None;
        self.heartbeat = None;
        self.shared.state.set(ConnectionState::Disconnected);

        debug!(
            code = info.code,
            reason = %info.reason,
            was_clean = info.was_clean,
            "Transport closed"
        );

        registry::notify_disconnect(&self.shared.registry);

        if !self.intentional_close && !info.is_normal() {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.intentional_close {
            return;
        }

        let Some(delay) = self.backoff.delay(self.attempts) else {
            if self.config.debug {
                warn!(
                    attempts = self.attempts,
                    "Reconnect attempts exhausted, giving up"
                );
            }
            return;
        };

        self.set_attempts(self.attempts + 1);
        self.shared.state.set(ConnectionState::Reconnecting);

        if self.config.debug {
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.attempts,
                max_attempts = self.backoff.max_attempts(),
                "Reconnect scheduled"
            );
        }

        self.reconnect = Some(Box::pin(sleep(delay)));
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn start_heartbeat(&mut self) {
        let period = self.config.heartbeat_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.heartbeat = Some(ticker);
    }

    async fn send_heartbeat(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        match Heartbeat::now().to_text() {
            Ok(frame) => match transport.send(frame).await {
                Ok(()) => trace!("Heartbeat sent"),
                Err(e) => warn!(error = %e, "Failed to send heartbeat"),
            },
            Err(e) => warn!(error = %e, "Failed to encode heartbeat"),
        }
    }

    async fn authenticate(&mut self) {
        let Some(token) = self.tokens.as_ref().and_then(|provider| provider.token()) else {
            return;
        };

        let frame = match Envelope::with_payload(Topic::Auth, &AuthPayload { token })
            .and_then(|envelope| envelope.to_text())
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode auth message");
                return;
            }
        };

        if let Some(transport) = self.transport.as_mut() {
            match transport.send(frame).await {
                Ok(()) => debug!("Sent authentication message"),
                Err(e) => warn!(error = %e, "Failed to send auth message"),
            }
        }
    }

    /// Writes queued frames oldest first until the queue is empty or a write
    /// fails.
    async fn flush_queue(&mut self) {
        let mut flushed = 0usize;

        while let Some(transport) = self.transport.as_mut() {
            let next = self.shared.queue.lock().pop();
            let Some(frame) = next else {
                break;
            };

            if let Err(e) = transport.send(frame.clone()).await {
                warn!(error = %e, "Flush interrupted, frame requeued");
                self.shared.queue.lock().requeue_front(frame);
                break;
            }
            flushed += 1;
        }

        if flushed > 0 {
            debug!(flushed, "Flushed queued messages");
        }
    }

    fn enqueue(&self, frame: String) {
        let evicted = self.shared.queue.lock().push(frame);
        if evicted.is_some() && self.config.debug {
            debug!(
                capacity = self.config.message_queue_size,
                "Outbound queue full, oldest message dropped"
            );
        }
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
        self.shared.attempts.store(attempts, Ordering::Release);
    }
}

impl Drop for Session {
    /// Cleans up when the task is dropped without running `destroy`, as on
    /// runtime shutdown.
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            close_detached(transport);
            registry::notify_disconnect(&self.shared.registry);
        }

        self.shared.registry.lock().clear();
        self.shared.queue.lock().clear();
        self.shared.destroyed.store(true, Ordering::Release);
        self.shared.state.set(ConnectionState::Destroyed);
    }
}

/// Best-effort close from a synchronous context.
fn close_detached(mut transport: BoxTransport) {
    let Ok(runtime) = Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        if let Err(e) = transport.close(NORMAL_CLOSURE, CLIENT_DISCONNECT_REASON).await {
            debug!(error = %e, "Close on drop failed");
        }
    });
}

// ============================================================================
// Event Sources
// ============================================================================

async fn wait_connect(pending: &mut Option<PendingConnect>) -> Result<BoxTransport> {
    match pending {
        Some(connecting) => connecting.await,
        None => future::pending().await,
    }
}

async fn wait_event(transport: &mut Option<BoxTransport>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => future::pending().await,
    }
}

async fn wait_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
