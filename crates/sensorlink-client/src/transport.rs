//! Transport abstraction and the tokio-tungstenite implementation.
//!
//! A transport is created synchronously and reports its lifecycle through
//! events, the same way a browser `WebSocket` does:
//!
//! - `Open` once the handshake succeeds
//! - `Message` for every inbound text frame
//! - `Error` for faults (always followed by `Close`)
//! - `Close` exactly once, when the connection is gone
//!
//! Dropping the [`TransportHandle`] discards the transport: the socket task
//! sends a close frame and exits, and no further events are delivered.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

use sensorlink_core::Endpoint;

/// Default time allowed for the TCP + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level faults reported through [`TransportEvent::Error`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection attempt did not succeed.
    #[error("connection attempt failed: {0}")]
    OpenFailed(String),

    /// The peer went away without a close handshake.
    #[error("connection closed unexpectedly")]
    ClosedUnexpectedly,

    /// WebSocket protocol or I/O error on an open connection.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Lifecycle events emitted by a transport.
#[derive(Debug)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(TransportError),
    Close,
}

/// The channel worker's side of a transport.
#[derive(Debug)]
pub struct TransportHandle {
    events: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
}

/// The transport implementation's side: emits events, receives frames.
#[derive(Debug)]
pub struct TransportPeer {
    pub events: mpsc::Sender<TransportEvent>,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl TransportHandle {
    /// Create a connected handle/peer pair.
    pub fn pair(event_buffer: usize) -> (TransportHandle, TransportPeer) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            TransportHandle {
                events: event_rx,
                outbound: outbound_tx,
            },
            TransportPeer {
                events: event_tx,
                outbound: outbound_rx,
            },
        )
    }

    /// Next lifecycle event. `None` means the transport is gone without
    /// having reported a close.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Queue a text frame for transmission.
    ///
    /// Fails if the transport implementation has already shut down.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .map_err(|_| TransportError::ClosedUnexpectedly)
    }
}

/// Creates transports to an endpoint.
///
/// `connect` must not block; the connection is established in the
/// background and reported through the returned handle's events.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &Endpoint, event_buffer: usize) -> TransportHandle;
}

// ============================================================================
// WebSocket Connector
// ============================================================================

/// Connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Limit how long a single connection attempt may take.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    fn connect(&self, endpoint: &Endpoint, event_buffer: usize) -> TransportHandle {
        let (handle, peer) = TransportHandle::pair(event_buffer);
        let url = endpoint.to_string();
        let connect_timeout = self.connect_timeout;

        tokio::spawn(async move {
            run_socket(url, connect_timeout, peer).await;
        });

        handle
    }
}

/// Owns one WebSocket for its whole life. Always ends with `Close` unless the
/// handle was dropped first.
async fn run_socket(url: String, connect_timeout: Duration, mut peer: TransportPeer) {
    let socket = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            let _ = peer
                .events
                .send(TransportEvent::Error(TransportError::OpenFailed(e.to_string())))
                .await;
            let _ = peer.events.send(TransportEvent::Close).await;
            return;
        }
        Err(_) => {
            let _ = peer
                .events
                .send(TransportEvent::Error(TransportError::OpenFailed(format!(
                    "timed out after {}ms",
                    connect_timeout.as_millis()
                ))))
                .await;
            let _ = peer.events.send(TransportEvent::Close).await;
            return;
        }
    };

    if peer.events.send(TransportEvent::Open).await.is_err() {
        debug!("Transport for {} discarded before open was reported", url);
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            frame = peer.outbound.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text)).await {
                            let _ = peer.events.send(TransportEvent::Error(e.into())).await;
                            break;
                        }
                    }
                    None => {
                        // Handle dropped: the owner discarded this transport.
                        let _ = ws_tx.send(Message::Close(None)).await;
                        let _ = ws_tx.close().await;
                        debug!("Closed discarded transport to {}", url);
                        return;
                    }
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if peer.events.send(TransportEvent::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        if peer.events.send(TransportEvent::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            let _ = peer.events.send(TransportEvent::Error(e.into())).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server closed connection to {}: {:?}", url, frame);
                        break;
                    }
                    Some(Ok(_)) => {} // Pong and raw frames
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", url, e);
                        let _ = peer.events.send(TransportEvent::Error(e.into())).await;
                        break;
                    }
                    None => {
                        let _ = peer
                            .events
                            .send(TransportEvent::Error(TransportError::ClosedUnexpectedly))
                            .await;
                        break;
                    }
                }
            }
        }
    }

    let _ = peer.events.send(TransportEvent::Close).await;
}
