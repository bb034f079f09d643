//! Shared helpers for the integration tests.
//!
//! [`MemoryConnector`] hands the client an in-process transport and the test
//! a matching [`ServerEnd`], so every frame and close can be scripted under
//! paused tokio time.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use realtime_channels::transport::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use realtime_channels::{
    BoxTransport, CloseInfo, Connector, Error, Result, Transport, TransportEvent,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lets spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock by `ms` milliseconds.
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

// ============================================================================
// Frames
// ============================================================================

/// What the client wrote to its transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Close(u16, String),
}

impl Frame {
    /// Parses a text frame as JSON.
    pub fn json(&self) -> Value {
        match self {
            Frame::Text(text) => serde_json::from_str(text).expect("client wrote invalid JSON"),
            Frame::Close(code, reason) => panic!("expected text frame, got close {code} {reason}"),
        }
    }

    /// Returns the `type` of a text frame.
    pub fn topic(&self) -> String {
        self.json()["type"]
            .as_str()
            .expect("frame without type")
            .to_owned()
    }
}

enum ServerEvent {
    Message(String),
    Close(CloseInfo),
}

// ============================================================================
// MemoryConnector
// ============================================================================

struct ConnectorState {
    failures_left: AtomicUsize,
    attempts: Mutex<Vec<(Instant, String)>>,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

/// Connector producing in-memory transports.
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<ConnectorState>,
}

impl MemoryConnector {
    /// Creates a connector and the stream of server ends it accepts.
    pub fn new() -> (Self, Acceptor) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(ConnectorState {
                failures_left: AtomicUsize::new(0),
                attempts: Mutex::new(Vec::new()),
                accepted,
            }),
        };
        (connector, Acceptor { incoming })
    }

    /// Makes the next `count` connects fail.
    pub fn fail_next(&self, count: usize) {
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    /// Makes every connect fail.
    pub fn fail_always(&self) {
        self.fail_next(usize::MAX);
    }

    /// Number of connect calls so far.
    pub fn attempt_count(&self) -> usize {
        self.state.attempts.lock().len()
    }

    /// Time of every connect call.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state.attempts.lock().iter().map(|(at, _)| *at).collect()
    }

    /// URL of every connect call.
    pub fn attempt_urls(&self) -> Vec<String> {
        self.state
            .attempts
            .lock()
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str, _protocols: &[String]) -> Result<BoxTransport> {
        self.state
            .attempts
            .lock()
            .push((Instant::now(), url.to_owned()));

        let failing = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(Error::connection(format!("connection refused: {url}")));
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();

        let server = ServerEnd {
            events: to_client,
            frames: from_client,
        };
        if self.state.accepted.send(server).is_err() {
            return Err(Error::connection("test acceptor dropped"));
        }

        Ok(Box::new(MemoryTransport {
            frames: to_server,
            events: from_server,
        }))
    }
}

/// Receives the server end of every accepted connection.
pub struct Acceptor {
    incoming: mpsc::UnboundedReceiver<ServerEnd>,
}

impl Acceptor {
    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> ServerEnd {
        self.incoming.recv().await.expect("connector dropped")
    }

    /// Returns an already accepted connection, if any.
    pub fn try_accept(&mut self) -> Option<ServerEnd> {
        self.incoming.try_recv().ok()
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

struct MemoryTransport {
    frames: mpsc::UnboundedSender<Frame>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.frames
            .send(Frame::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn recv(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(ServerEvent::Message(text)) => TransportEvent::Message(text),
            Some(ServerEvent::Close(info)) => TransportEvent::Closed(info),
            None => TransportEvent::Closed(CloseInfo::abnormal()),
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.frames
            .send(Frame::Close(code, reason.to_owned()))
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// ServerEnd
// ============================================================================

/// The test's side of one in-memory connection.
pub struct ServerEnd {
    events: mpsc::UnboundedSender<ServerEvent>,
    frames: mpsc::UnboundedReceiver<Frame>,
}

impl ServerEnd {
    /// Delivers a text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.events.send(ServerEvent::Message(text.into()));
    }

    /// Delivers a JSON message to the client.
    pub fn push_json(&self, value: Value) {
        self.push(value.to_string());
    }

    /// Closes cleanly with `code`.
    pub fn close(&self, code: u16) {
        let _ = self
            .events
            .send(ServerEvent::Close(CloseInfo::new(code, "server close", true)));
    }

    /// Closes cleanly with 1000.
    pub fn close_normal(&self) {
        self.close(NORMAL_CLOSURE);
    }

    /// Drops the connection without a closing handshake.
    pub fn drop_connection(&self) {
        let _ = self.events.send(ServerEvent::Close(CloseInfo::new(
            ABNORMAL_CLOSURE,
            "",
            false,
        )));
    }

    /// Waits for the next frame the client writes.
    pub async fn next_frame(&mut self) -> Frame {
        self.frames.recv().await.expect("client transport dropped")
    }

    /// Returns every frame written so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Returns the text frames written so far as JSON.
    pub fn drain_json(&mut self) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|frame| matches!(frame, Frame::Text(_)))
            .map(|frame| frame.json())
            .collect()
    }
}
