//! Errors surfaced to channel callers.
//!
//! Transport faults never reach callers; the worker absorbs them and turns
//! them into state transitions. What remains are the conditions a caller can
//! act on.

use sensorlink_core::ConfigError;
use sensorlink_protocol::CodecError;
use thiserror::Error;

/// Errors returned by [`ChannelClient`](crate::ChannelClient) operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A send was attempted while no connection is open. Expected during
    /// reconnect windows; nothing was transmitted.
    #[error("channel is not connected")]
    NotConnected,

    /// The outbound queue to the worker is full.
    #[error("outbound queue is full")]
    OutboundFull,

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] CodecError),

    /// The configuration failed validation on activation.
    #[error("invalid channel configuration: {0}")]
    Config(#[from] ConfigError),

    /// The client was deactivated and cannot be activated again.
    #[error("channel has been deactivated")]
    Deactivated,

    /// `activate()` was called outside a tokio runtime.
    #[error("no tokio runtime available to run the channel worker")]
    NoRuntime,
}
