//! The reconnecting channel client.
//!
//! [`ChannelClient`] is the object a host binds to its own lifecycle:
//! `activate()` on mount, `deactivate()` on unmount. Between the two, a
//! single worker task owns the transport and is the only writer of the
//! observable state:
//!
//! ```text
//! disconnected --(open)--> connected --(close)--> disconnected
//!      ^                                               |
//!      +------------- reconnect delay elapses ---------+
//! ```
//!
//! The reconnect delay is a sleep inside the worker, so at most one
//! reconnect can be pending and none is ever pending while a connection is
//! open.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use sensorlink_core::{ChannelConfig, ChannelState};
use sensorlink_protocol::encode_message;

use crate::error::ChannelError;
use crate::publisher::{state_channel, StatePublisher, StateWriter};
use crate::statistics::{ChannelStatistics, StatisticsSnapshot};
use crate::transport::{Connector, TransportEvent, TransportHandle, WsConnector};

/// Parts handed to the worker on activation.
struct WorkerParts {
    writer: StateWriter,
    outbound_rx: mpsc::Receiver<String>,
}

enum Lifecycle {
    Idle(WorkerParts),
    Active {
        shutdown: oneshot::Sender<()>,
        worker: JoinHandle<()>,
    },
    Deactivated,
}

/// Auto-reconnecting client for one telemetry endpoint.
///
/// Dropping the client tears it down like [`deactivate`](Self::deactivate),
/// without waiting for the worker to finish.
pub struct ChannelClient<C: Connector = WsConnector> {
    id: Uuid,
    config: ChannelConfig,
    connector: Arc<C>,
    publisher: StatePublisher,
    outbound_tx: mpsc::Sender<String>,
    stats: Arc<ChannelStatistics>,
    lifecycle: Lifecycle,
}

impl ChannelClient<WsConnector> {
    /// Create an inactive client using the WebSocket connector.
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(config, WsConnector::new())
    }

    /// Create a client and open the connection immediately.
    pub fn connect(config: ChannelConfig) -> Result<Self, ChannelError> {
        let mut client = Self::new(config);
        client.activate()?;
        Ok(client)
    }
}

impl<C: Connector> ChannelClient<C> {
    /// Create an inactive client with a custom connector.
    pub fn with_connector(config: ChannelConfig, connector: C) -> Self {
        let (writer, publisher) = state_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer.max(1));

        Self {
            id: Uuid::new_v4(),
            config,
            connector: Arc::new(connector),
            publisher,
            outbound_tx,
            stats: Arc::new(ChannelStatistics::new()),
            lifecycle: Lifecycle::Idle(WorkerParts {
                writer,
                outbound_rx,
            }),
        }
    }

    /// Identifier used in log spans.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Start the connection manager.
    ///
    /// No-op when already active. Fails after [`deactivate`](Self::deactivate),
    /// when the configuration does not validate, or when called outside a
    /// tokio runtime.
    pub fn activate(&mut self) -> Result<(), ChannelError> {
        match &self.lifecycle {
            Lifecycle::Active { .. } => {
                debug!(client = %self.id, "activate() on an active channel ignored");
                return Ok(());
            }
            Lifecycle::Deactivated => return Err(ChannelError::Deactivated),
            Lifecycle::Idle(_) => {}
        }

        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let parts = match std::mem::replace(&mut self.lifecycle, Lifecycle::Deactivated) {
            Lifecycle::Idle(parts) => parts,
            other => {
                self.lifecycle = other;
                return Ok(());
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            writer: parts.writer,
            outbound_rx: parts.outbound_rx,
            stats: Arc::clone(&self.stats),
            shutdown: shutdown_rx,
        };

        let span = info_span!("channel", client = %self.id, endpoint = %self.config.endpoint);
        let handle = runtime.spawn(worker.run().instrument(span));

        self.lifecycle = Lifecycle::Active {
            shutdown: shutdown_tx,
            worker: handle,
        };
        Ok(())
    }

    /// Tear the channel down: close the transport, cancel any pending
    /// reconnect and wait for the worker to exit.
    ///
    /// The status ends as `Disconnected`; the last message is kept.
    pub async fn deactivate(&mut self) {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Deactivated) {
            Lifecycle::Idle(_) => {
                debug!(client = %self.id, "Deactivated before activation");
            }
            Lifecycle::Active { shutdown, worker } => {
                let _ = shutdown.send(());
                if let Err(e) = worker.await {
                    error!(client = %self.id, "Channel worker failed: {}", e);
                }
                info!(client = %self.id, "Channel deactivated");
            }
            Lifecycle::Deactivated => {}
        }
    }

    /// Whether the connection manager is running.
    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active { .. })
    }

    /// Current connection status.
    pub fn status(&self) -> ChannelState {
        self.publisher.status()
    }

    /// Most recent inbound payload.
    pub fn last_message(&self) -> Option<String> {
        self.publisher.last_message()
    }

    /// Observable state for consumers.
    pub fn publisher(&self) -> &StatePublisher {
        &self.publisher
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Serialize `message` to JSON and transmit it as one text frame.
    ///
    /// Fire-and-forget: success means the frame was handed to the live
    /// connection, not that the peer received it.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        let text = encode_message(message)?;
        self.enqueue(text)
    }

    /// Transmit an already-encoded text frame.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ChannelError> {
        self.ensure_connected()?;
        self.enqueue(text.into())
    }

    fn ensure_connected(&self) -> Result<(), ChannelError> {
        if self.is_active() && self.publisher.status().is_connected() {
            return Ok(());
        }
        self.stats.record_send_rejected();
        warn!(client = %self.id, "Send rejected: channel is not connected");
        Err(ChannelError::NotConnected)
    }

    fn enqueue(&self, text: String) -> Result<(), ChannelError> {
        self.outbound_tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.stats.record_send_rejected();
                warn!(client = %self.id, "Send rejected: outbound queue is full");
                ChannelError::OutboundFull
            }
            mpsc::error::TrySendError::Closed(_) => {
                self.stats.record_send_rejected();
                ChannelError::NotConnected
            }
        })
    }
}

// ============================================================================
// Connection Manager
// ============================================================================

enum SessionOutcome {
    /// The transport closed. `opened` tells whether it ever reported open.
    Closed { opened: bool },
    Shutdown,
}

struct Worker<C: Connector> {
    config: ChannelConfig,
    connector: Arc<C>,
    writer: StateWriter,
    outbound_rx: mpsc::Receiver<String>,
    stats: Arc<ChannelStatistics>,
    shutdown: oneshot::Receiver<()>,
}

impl<C: Connector> Worker<C> {
    async fn run(mut self) {
        // Consecutive attempts since the last successful open.
        let mut attempt: u32 = 0;

        loop {
            self.stats.record_connection_attempt();
            debug!("Connecting to {}", self.config.endpoint);
            let mut transport = self
                .connector
                .connect(&self.config.endpoint, self.config.event_buffer);

            let outcome = self.drive(&mut transport).await;
            // Discard the old transport before any reconnect.
            drop(transport);

            match outcome {
                SessionOutcome::Shutdown => break,
                SessionOutcome::Closed { opened } => {
                    if opened {
                        attempt = 0;
                    }
                    attempt = attempt.saturating_add(1);

                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Channel closed, reconnecting"
                    );
                    if !self.wait_before_reconnect(delay).await {
                        break;
                    }
                }
            }
        }

        self.writer.set_status(ChannelState::Disconnected);
        debug!("Channel worker stopped");
    }

    /// Process one transport until it closes or shutdown is requested.
    async fn drive(&mut self, transport: &mut TransportHandle) -> SessionOutcome {
        let mut opened = false;

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown => return SessionOutcome::Shutdown,

                // Outbound ahead of inbound so a chatty peer cannot starve sends.
                frame = self.outbound_rx.recv() => {
                    match frame {
                        Some(text) if opened => match transport.send_text(text) {
                            Ok(()) => self.stats.record_frame_sent(),
                            Err(e) => {
                                self.stats.record_send_rejected();
                                warn!("Dropped outbound frame: {}", e);
                            }
                        },
                        Some(_) => {
                            self.stats.record_send_rejected();
                            warn!("Dropped outbound frame: channel is not connected");
                        }
                        None => return SessionOutcome::Shutdown,
                    }
                }

                event = transport.next_event() => {
                    match event {
                        Some(TransportEvent::Open) => {
                            opened = true;
                            self.stats.record_open();
                            self.writer.set_status(ChannelState::Connected);
                            info!("Channel connected to {}", self.config.endpoint);
                        }
                        Some(TransportEvent::Message(payload)) => {
                            self.stats.record_message();
                            self.writer.set_last_message(payload);
                        }
                        Some(TransportEvent::Error(e)) => {
                            // The close that follows drives the reconnect.
                            self.stats.record_transport_error();
                            error!("Transport error: {}", e);
                        }
                        Some(TransportEvent::Close) | None => {
                            self.stats.record_close();
                            self.writer.set_status(ChannelState::Disconnected);
                            info!("Channel disconnected from {}", self.config.endpoint);
                            return SessionOutcome::Closed { opened };
                        }
                    }
                }
            }
        }
    }

    /// Sleep before the next attempt. Frames that arrive meanwhile are
    /// dropped. Returns false if shutdown was requested.
    async fn wait_before_reconnect(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown => return false,
                _ = &mut sleep => return true,
                frame = self.outbound_rx.recv() => {
                    match frame {
                        Some(_) => {
                            self.stats.record_send_rejected();
                            warn!("Dropped outbound frame: waiting to reconnect");
                        }
                        None => return false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use sensorlink_core::{Endpoint, ReconnectPolicy};
    use sensorlink_protocol::ControlCommand;

    use crate::transport::{TransportError, TransportPeer};

    /// Connector that hands every transport's peer side to the test.
    #[derive(Clone)]
    struct ScriptedConnector {
        attempts: Arc<AtomicUsize>,
        peers: mpsc::UnboundedSender<TransportPeer>,
    }

    impl ScriptedConnector {
        fn new() -> (Self, mpsc::UnboundedReceiver<TransportPeer>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    attempts: Arc::new(AtomicUsize::new(0)),
                    peers: tx,
                },
                rx,
            )
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, _endpoint: &Endpoint, event_buffer: usize) -> TransportHandle {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let (handle, peer) = TransportHandle::pair(event_buffer);
            let _ = self.peers.send(peer);
            handle
        }
    }

    fn test_config() -> ChannelConfig {
        ChannelConfig::new(Endpoint::parse("ws://controller.test/ws").unwrap())
    }

    async fn active_client() -> (
        ChannelClient<ScriptedConnector>,
        ScriptedConnector,
        mpsc::UnboundedReceiver<TransportPeer>,
    ) {
        let (connector, peers) = ScriptedConnector::new();
        let mut client = ChannelClient::with_connector(test_config(), connector.clone());
        client.activate().unwrap();
        (client, connector, peers)
    }

    async fn open(client: &ChannelClient<ScriptedConnector>, peer: &TransportPeer) {
        peer.events.send(TransportEvent::Open).await.unwrap();
        assert!(client.publisher().wait_for_status(ChannelState::Connected).await);
    }

    async fn close(client: &ChannelClient<ScriptedConnector>, peer: &TransportPeer) {
        peer.events.send(TransportEvent::Close).await.unwrap();
        assert!(client.publisher().wait_for_status(ChannelState::Disconnected).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_after_activate() {
        let (client, connector, mut peers) = active_client().await;
        let _peer = peers.recv().await.unwrap();

        assert!(client.is_active());
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.status(), ChannelState::Disconnected);
        assert_eq!(client.last_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_sets_connected() {
        let (client, _connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();

        open(&client, &peer).await;

        assert_eq!(client.status(), ChannelState::Connected);
        assert_eq!(client.statistics().connections_opened, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_overwrites_last_message() {
        let (client, _connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        let mut messages = client.publisher().watch_last_message();

        peer.events
            .send(TransportEvent::Message("42.5".to_string()))
            .await
            .unwrap();
        messages.changed().await.unwrap();
        assert_eq!(client.last_message().as_deref(), Some("42.5"));

        peer.events
            .send(TransportEvent::Message("43.0".to_string()))
            .await
            .unwrap();
        messages.changed().await.unwrap();
        assert_eq!(client.last_message().as_deref(), Some("43.0"));
        assert_eq!(client.statistics().messages_received, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_message_kept_across_disconnect() {
        let (client, _connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        let mut messages = client.publisher().watch_last_message();
        peer.events
            .send(TransportEvent::Message("{\"wT\":36.9}".to_string()))
            .await
            .unwrap();
        messages.changed().await.unwrap();

        close(&client, &peer).await;

        assert_eq!(client.last_message().as_deref(), Some("{\"wT\":36.9}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_once_after_delay() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        close(&client, &peer).await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(connector.attempts(), 2);
        let _second = peers.recv().await.unwrap();

        // The new transport is still pending, so nothing else is scheduled.
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.status(), ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_close_schedules_single_reconnect() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        // The second close may find the old transport already discarded.
        peer.events.send(TransportEvent::Close).await.unwrap();
        let _ = peer.events.send(TransportEvent::Close).await;
        assert!(client.publisher().wait_for_status(ChannelState::Disconnected).await);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(connector.attempts(), 2);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.statistics().connections_closed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_keep_retrying() {
        let (client, connector, mut peers) = active_client().await;

        for expected in 1..=3 {
            let peer = peers.recv().await.unwrap();
            assert_eq!(connector.attempts(), expected);
            peer.events
                .send(TransportEvent::Error(TransportError::OpenFailed(
                    "connection refused".to_string(),
                )))
                .await
                .unwrap();
            peer.events.send(TransportEvent::Close).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = client.statistics();
        assert_eq!(stats.transport_errors, 3);
        assert_eq!(stats.connections_opened, 0);
        assert_eq!(client.status(), ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_alone_does_not_reconnect() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        peer.events
            .send(TransportEvent::Error(TransportError::ClosedUnexpectedly))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(client.status(), ChannelState::Connected);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.statistics().transport_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_transport_counts_as_close() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        drop(peer);
        assert!(client.publisher().wait_for_status(ChannelState::Disconnected).await);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_between_failures() {
        let (connector, mut peers) = ScriptedConnector::new();
        let config = test_config().with_reconnect(ReconnectPolicy::Exponential {
            initial_delay_ms: 1000,
            max_delay_ms: 4000,
        });
        let mut client = ChannelClient::with_connector(config, connector.clone());
        client.activate().unwrap();

        // Attempt 1 fails immediately: next attempt after 1 s.
        let peer = peers.recv().await.unwrap();
        peer.events.send(TransportEvent::Close).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(connector.attempts(), 2);

        // Attempt 2 fails: next attempt after 2 s.
        let peer = peers.recv().await.unwrap();
        peer.events.send(TransportEvent::Close).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(connector.attempts(), 2);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(connector.attempts(), 3);

        // A successful open resets the backoff to 1 s.
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;
        close(&client, &peer).await;
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(connector.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_rejected_while_disconnected() {
        let (client, _connector, mut peers) = active_client().await;
        let mut peer = peers.recv().await.unwrap();

        let result = client.send(&serde_json::json!({ "command": "start" }));

        assert!(matches!(result, Err(ChannelError::NotConnected)));
        assert_eq!(client.statistics().sends_rejected, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_connected_transmits_one_frame() {
        let (client, _connector, mut peers) = active_client().await;
        let mut peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        client.send(&ControlCommand::Start).unwrap();

        assert_eq!(
            peer.outbound.recv().await.as_deref(),
            Some(r#"{"command":"start"}"#)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(peer.outbound.try_recv().is_err());
        assert_eq!(client.statistics().frames_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_not_replayed_across_reconnect() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;
        close(&client, &peer).await;

        // Reaches the worker while it waits to reconnect.
        client.outbound_tx.try_send("during-backoff".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.statistics().sends_rejected, 1);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let mut second = peers.recv().await.unwrap();
        assert_eq!(connector.attempts(), 2);

        // Reaches the worker before the new transport opens.
        client.outbound_tx.try_send("before-open".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.statistics().sends_rejected, 2);

        open(&client, &second).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(second.outbound.try_recv().is_err());
        assert_eq!(client.statistics().frames_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_frame_sent_before_pending_events() {
        let (client, _connector, mut peers) = active_client().await;
        let mut peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        peer.events
            .try_send(TransportEvent::Message("42.5".to_string()))
            .unwrap();
        peer.events.try_send(TransportEvent::Close).unwrap();
        client.send_text("stop").unwrap();

        assert_eq!(peer.outbound.recv().await.as_deref(), Some("stop"));
        assert!(client.publisher().wait_for_status(ChannelState::Disconnected).await);

        let stats = client.statistics();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.sends_rejected, 0);
        assert_eq!(client.last_message().as_deref(), Some("42.5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_outbound_queue_counts_as_rejected() {
        let (connector, mut peers) = ScriptedConnector::new();
        let mut config = test_config();
        config.outbound_buffer = 1;
        let mut client = ChannelClient::with_connector(config, connector);
        client.activate().unwrap();
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        client.send_text("first").unwrap();
        let result = client.send_text("second");

        assert!(matches!(result, Err(ChannelError::OutboundFull)));
        assert_eq!(client.statistics().sends_rejected, 1);
    }

    #[tokio::test]
    async fn test_activate_rejects_invalid_config() {
        let (connector, _peers) = ScriptedConnector::new();
        let config = test_config().with_reconnect(ReconnectPolicy::Fixed { delay_ms: 0 });
        let mut client = ChannelClient::with_connector(config, connector.clone());

        assert!(matches!(client.activate(), Err(ChannelError::Config(_))));
        assert!(!client.is_active());
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_send_before_activate_is_rejected() {
        let (connector, _peers) = ScriptedConnector::new();
        let client = ChannelClient::with_connector(test_config(), connector);

        assert!(matches!(
            client.send_text("ping"),
            Err(ChannelError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_is_idempotent() {
        let (mut client, connector, mut peers) = active_client().await;
        let _peer = peers.recv().await.unwrap();

        client.activate().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_cancels_pending_reconnect() {
        let (mut client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();
        open(&client, &peer).await;
        close(&client, &peer).await;

        client.deactivate().await;
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(connector.attempts(), 1);
        assert!(!client.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_closes_open_transport() {
        let (mut client, connector, mut peers) = active_client().await;
        let mut peer = peers.recv().await.unwrap();
        open(&client, &peer).await;

        client.deactivate().await;

        assert_eq!(client.status(), ChannelState::Disconnected);
        // The transport was discarded: late events go nowhere.
        assert!(peer.events.send(TransportEvent::Open).await.is_err());
        assert!(peer.outbound.recv().await.is_none());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(connector.attempts(), 1);
        assert!(matches!(client.send_text("x"), Err(ChannelError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_after_deactivate_fails() {
        let (mut client, _connector, mut peers) = active_client().await;
        let _peer = peers.recv().await.unwrap();

        client.deactivate().await;

        assert!(matches!(client.activate(), Err(ChannelError::Deactivated)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_worker() {
        let (client, connector, mut peers) = active_client().await;
        let peer = peers.recv().await.unwrap();

        drop(client);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(peer.events.send(TransportEvent::Close).await.is_err());
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[test]
    fn test_activate_outside_runtime() {
        let (connector, _peers) = ScriptedConnector::new();
        let mut client = ChannelClient::with_connector(test_config(), connector);

        assert!(matches!(client.activate(), Err(ChannelError::NoRuntime)));
        assert!(!client.is_active());
    }
}
