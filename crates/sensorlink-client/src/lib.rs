//! # sensorlink-client
//!
//! Resilient telemetry channel client built on tokio.
//!
//! A [`ChannelClient`] keeps exactly one live WebSocket connection to a fixed
//! endpoint and reconnects after every close. It combines three roles:
//!
//! - **Connection manager** - a background worker that owns the transport and
//!   drives connect → open → closed → reconnect
//! - **State publisher** - observable connection status and last payload
//!   ([`StatePublisher`])
//! - **Outbound gateway** - [`ChannelClient::send`], which refuses to transmit
//!   while the channel is not open
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sensorlink_client::{ChannelClient, ChannelConfig, Endpoint};
//! use sensorlink_protocol::ControlCommand;
//!
//! let config = ChannelConfig::new(Endpoint::parse("ws://raspberrypi.local:8000/ws")?);
//! let mut client = ChannelClient::connect(config)?;
//!
//! let mut status = client.publisher().watch_status();
//! while status.changed().await.is_ok() {
//!     if status.borrow().is_connected() {
//!         client.send(&ControlCommand::Start)?;
//!     }
//! }
//!
//! client.deactivate().await;
//! ```

pub mod client;
pub mod error;
pub mod publisher;
pub mod statistics;
pub mod transport;

pub use client::ChannelClient;
pub use error::ChannelError;
pub use publisher::StatePublisher;
pub use statistics::{ChannelStatistics, StatisticsSnapshot};
pub use transport::{Connector, TransportError, TransportEvent, TransportHandle, TransportPeer, WsConnector};

pub use sensorlink_core::{ChannelConfig, ChannelState, Endpoint, ReconnectPolicy};
