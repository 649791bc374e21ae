//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::options::{initial_backoff, max_backoff, ServerOption};
use crate::transport::{FramingMode, MAX_MESSAGE_LEN};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Where to accept connections.
    pub listener: ListenerConfig,

    /// Where to forward them.
    pub target: TargetConfig,

    /// Transport used between the two connections.
    pub mode: FramingMode,

    /// Line framing settings.
    pub framing: FramingConfig,

    /// Accept loop retry settings.
    pub accept: AcceptConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Server options derived from this configuration.
    pub fn server_options(&self) -> Vec<ServerOption> {
        vec![
            initial_backoff(Duration::from_millis(self.accept.initial_backoff_ms)),
            max_backoff(Duration::from_millis(self.accept.max_backoff_ms)),
        ]
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Relay target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target address (e.g., "127.0.0.1:3333").
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3333".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

impl TargetConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Line framing limits, used by the `tcp` and `http` modes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Longest message accepted before a newline, in bytes.
    pub max_message_len: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

/// Accept loop backoff in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcceptConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 5,
            max_backoff_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
