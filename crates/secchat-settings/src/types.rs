//! Settings types.
//!
//! All structs use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file fills the missing fields from [`Default`].

use serde::{Deserialize, Serialize};

/// Root settings object, mirrors `~/.secchat/settings.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Chat server endpoint.
    pub server: ServerSettings,
    /// Ping cadence and dead-man's switch.
    pub heartbeat: HeartbeatSettings,
    /// Automatic reconnection.
    pub reconnect: ReconnectSettings,
    /// Acknowledgment tracking for sent messages.
    pub delivery: DeliverySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Chat server endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// WebSocket URL of the chat server.
    pub url: String,
    /// Bound on a single connection attempt.
    pub connect_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Heartbeat settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatSettings {
    /// Interval between `ping` frames.
    pub interval_ms: u64,
    /// Silence after which the connection is presumed dead.
    pub timeout_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 45_000,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Delay multiplied by the attempt number.
    pub base_delay_ms: u64,
    /// Cap on any single delay.
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before giving up. `None` (or `0` in the
    /// file or environment) retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 3_000,
            max_delay_ms: 10_000,
            max_attempts: None,
        }
    }
}

/// Delivery tracking settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliverySettings {
    /// Time allowed for the server to echo a tracked message.
    pub timeout_ms: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format: `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}
