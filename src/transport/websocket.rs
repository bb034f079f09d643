//! WebSocket transport over tokio-tungstenite.
//!
//! Protocol-level ping/pong frames are answered by tungstenite itself and
//! never reach the session. Binary frames are accepted when they hold UTF-8.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::config::validate_url;
use crate::error::{Error, Result};

use super::{BoxTransport, CloseInfo, Connector, NO_STATUS_RECEIVED, Transport, TransportEvent};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens WebSocket connections with `connect_async`.
///
/// `wss://` endpoints need the `native-tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str, protocols: &[String]) -> Result<BoxTransport> {
        validate_url(url)?;

        let mut request = url.into_client_request()?;

        if !protocols.is_empty() {
            let offered = protocols.join(", ");
            let value = HeaderValue::from_str(&offered)
                .map_err(|e| Error::config(format!("Invalid sub-protocol list '{offered}': {e}")))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let (stream, response) = connect_async(request).await?;

        debug!(url, status = %response.status(), "WebSocket handshake completed");

        Ok(Box::new(WebSocketTransport::new(stream)))
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// An open WebSocket connection.
pub struct WebSocketTransport {
    stream: WsStream,
    /// Set after a read error; the next `recv` reports an abnormal close.
    failed: bool,
}

impl WebSocketTransport {
    fn new(stream: WsStream) -> Self {
        Self {
            stream,
            failed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        if self.failed {
            return TransportEvent::Closed(CloseInfo::abnormal());
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportEvent::Message(text.as_str().to_owned());
                }

                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return TransportEvent::Message(text),
                    Err(_) => trace!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                },

                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => {
                            CloseInfo::new(u16::from(frame.code), frame.reason.as_str(), true)
                        }
                        None => CloseInfo::new(NO_STATUS_RECEIVED, "", true),
                    };
                    debug!(code = info.code, reason = %info.reason, "WebSocket closed by remote");
                    return TransportEvent::Closed(info);
                }

                // Ping, Pong, raw frames
                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    self.failed = true;
                    return TransportEvent::Error(Error::from(e));
                }

                None => {
                    debug!("WebSocket stream ended");
                    return TransportEvent::Closed(CloseInfo::abnormal());
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
