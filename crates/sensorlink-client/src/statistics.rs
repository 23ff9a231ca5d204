//! Channel statistics collection.
//!
//! Counters are updated by the channel worker and the outbound gateway and
//! can be read at any time through a [`StatisticsSnapshot`]:
//! - Connection attempts, opens, closes and transport errors
//! - Inbound messages and outbound frames
//! - Sends rejected while disconnected
//! - Time of the last inbound message

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time copy of the channel counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Transports created, including the first connection.
    pub connection_attempts: u64,

    /// Open events received.
    pub connections_opened: u64,

    /// Close events received (clean or abnormal).
    pub connections_closed: u64,

    /// Error events received from transports.
    pub transport_errors: u64,

    /// Inbound payloads delivered to the publisher.
    pub messages_received: u64,

    /// Frames handed to an open transport.
    pub frames_sent: u64,

    /// Sends refused because the channel was not open.
    pub sends_rejected: u64,

    /// When the last inbound payload arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Atomic counters shared between the client and its worker.
#[derive(Debug, Default)]
pub struct ChannelStatistics {
    connection_attempts: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    transport_errors: AtomicU64,
    messages_received: AtomicU64,
    frames_sent: AtomicU64,
    sends_rejected: AtomicU64,
    /// Milliseconds since the Unix epoch, 0 when nothing was received yet.
    last_message_at_ms: AtomicI64,
}

impl ChannelStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_rejected(&self) {
        self.sends_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let last_ms = self.last_message_at_ms.load(Ordering::Relaxed);

        StatisticsSnapshot {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            sends_rejected: self.sends_rejected.load(Ordering::Relaxed),
            last_message_at: (last_ms != 0)
                .then(|| DateTime::from_timestamp_millis(last_ms))
                .flatten(),
        }
    }
}
