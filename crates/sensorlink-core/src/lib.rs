//! # sensorlink-core
//!
//! Core types for the SensorLink telemetry channel.
//!
//! This crate provides:
//! - The observable channel status (`ChannelState`)
//! - The fixed connection target (`Endpoint`)
//! - Channel configuration and reconnection policy
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so hosts that never touch tokio can still share the configuration types.

pub mod config;
pub mod state;

pub use config::{ChannelConfig, ConfigError, Endpoint, ReconnectPolicy};
pub use state::ChannelState;
