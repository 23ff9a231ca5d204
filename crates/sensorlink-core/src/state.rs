//! Channel connection status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status of a telemetry channel.
///
/// A connection attempt that has not yet produced an open event is reported
/// as `Disconnected`; there is no separate "connecting" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// No open transport. Initial state, and the state between reconnects.
    #[default]
    Disconnected,
    /// The transport reported open and has not closed since.
    Connected,
}

impl ChannelState {
    /// Returns true when outbound frames may be transmitted.
    pub fn is_connected(self) -> bool {
        matches!(self, ChannelState::Connected)
    }

    /// Lowercase name used in logs and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connected => "connected",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
