//! Session configuration.

use std::time::Duration;

use secchat_core::backoff::ReconnectPolicy;
use secchat_settings::ClientSettings;

/// Heartbeat timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between `ping` frames.
    pub interval: Duration,
    /// Inbound silence after which the channel is declared dead.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(45),
        }
    }
}

/// Everything the session actor needs to know up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Heartbeat timing.
    pub heartbeat: HeartbeatConfig,
    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
    /// Time allowed for a tracked message to be echoed back.
    pub delivery_timeout: Duration,
    /// Capacity of the command queue between handles and the actor.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectPolicy::default(),
            delivery_timeout: Duration::from_secs(10),
            command_buffer: 64,
        }
    }
}

impl SessionConfig {
    /// Build from loaded client settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.server.connect_timeout_ms),
            heartbeat: HeartbeatConfig {
                interval: Duration::from_millis(settings.heartbeat.interval_ms),
                timeout: Duration::from_millis(settings.heartbeat.timeout_ms),
            },
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(settings.reconnect.base_delay_ms),
                max_delay: Duration::from_millis(settings.reconnect.max_delay_ms),
                max_attempts: settings.reconnect.max_attempts.filter(|&n| n > 0),
            },
            delivery_timeout: Duration::from_millis(settings.delivery.timeout_ms),
            ..Self::default()
        }
    }
}
