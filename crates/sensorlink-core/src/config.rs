//! Channel configuration.
//!
//! Configuration is plain data with serde support so that hosts can load it
//! from a JSON file, an environment-provided string, or build it in code:
//!
//! ```json
//! {
//!   "endpoint": "ws://raspberrypi.local:8000/ws",
//!   "reconnect": { "policy": "fixed", "delayMs": 1000 },
//!   "outboundBuffer": 64,
//!   "eventBuffer": 256
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Delay before reconnecting after a close, unless configured otherwise.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound used by [`ReconnectPolicy::exponential_default`].
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

const DEFAULT_OUTBOUND_BUFFER: usize = 64;
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON or has the wrong shape.
    #[error("invalid configuration data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// The endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid endpoint '{0}': expected ws:// or wss:// URL with a host")]
    InvalidEndpoint(String),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Endpoint
// ============================================================================

/// Connection target for a channel.
///
/// Fixed for the lifetime of a client; every reconnect dials the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    /// Parse and validate an endpoint URL.
    ///
    /// Surrounding whitespace is trimmed.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        let rest = url
            .strip_prefix("ws://")
            .or_else(|| url.strip_prefix("wss://"))
            .ok_or_else(|| ConfigError::InvalidEndpoint(url.to_string()))?;

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if authority.is_empty() || authority.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidEndpoint(url.to_string()));
        }

        Ok(Self(url.to_string()))
    }

    /// The URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Endpoint::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl std::str::FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

// ============================================================================
// Reconnect Policy
// ============================================================================

/// How long to wait before the next connection attempt.
///
/// `attempt` counts consecutive attempts since the last successful open and
/// starts at 1 for the first reconnect after a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Same delay before every attempt, retrying forever.
    Fixed {
        #[serde(rename = "delayMs")]
        delay_ms: u64,
    },
    /// Delay doubles on every failed attempt up to `max_delay_ms`.
    Exponential {
        #[serde(rename = "initialDelayMs")]
        initial_delay_ms: u64,
        #[serde(rename = "maxDelayMs")]
        max_delay_ms: u64,
    },
}

impl ReconnectPolicy {
    /// Fixed delay policy. Sub-millisecond delays round up to 1 ms.
    pub fn fixed(delay: Duration) -> Self {
        let delay_ms = delay.as_nanos().div_ceil(1_000_000);
        ReconnectPolicy::Fixed {
            delay_ms: u64::try_from(delay_ms).unwrap_or(u64::MAX),
        }
    }

    /// Exponential policy starting at 1 s and capped at 30 s.
    pub fn exponential_default() -> Self {
        ReconnectPolicy::Exponential {
            initial_delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_RECONNECT_DELAY.as_millis() as u64,
        }
    }

    /// Delay to apply before the given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            ReconnectPolicy::Exponential {
                initial_delay_ms,
                max_delay_ms,
            } => {
                let max = Duration::from_millis(max_delay_ms);
                let mut delay = Duration::from_millis(initial_delay_ms);
                for _ in 1..attempt {
                    if delay >= max {
                        break;
                    }
                    delay = delay.saturating_mul(2);
                }
                delay.min(max)
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ReconnectPolicy::Fixed { delay_ms } => {
                if delay_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "reconnect.delayMs must be > 0".to_string(),
                    ));
                }
            }
            ReconnectPolicy::Exponential {
                initial_delay_ms,
                max_delay_ms,
            } => {
                if initial_delay_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "reconnect.initialDelayMs must be > 0".to_string(),
                    ));
                }
                if max_delay_ms < initial_delay_ms {
                    return Err(ConfigError::Invalid(
                        "reconnect.maxDelayMs must be >= initialDelayMs".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

// ============================================================================
// Channel Configuration
// ============================================================================

/// Configuration for a single telemetry channel client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Connection target.
    pub endpoint: Endpoint,

    /// Reconnection policy after a close.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Capacity of the queue between `send()` callers and the worker.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Capacity of the transport event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl ChannelConfig {
    /// Configuration with defaults for everything but the endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Replace the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ChannelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reconnect.validate()?;
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid("outboundBuffer must be > 0".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("eventBuffer must be > 0".to_string()));
        }
        Ok(())
    }
}
