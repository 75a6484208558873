//! Connection lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session connection state. Exactly one value holds at any instant.
///
/// ```text
/// Disconnected ─connect─▶ Connecting ─open─▶ Connected ─auth_success─▶ Authenticated
///                              ▲                 │                          │
///                              └─ Reconnecting ◀─┴──── close / error / ─────┘
///                                                      heartbeat timeout
/// any ─disconnect─▶ ManuallyClosed
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No channel and no reconnect pending.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Channel is open.
    Connected,
    /// Channel is open and the server accepted our credentials.
    Authenticated,
    /// Waiting for the next reconnect attempt.
    Reconnecting,
    /// Explicitly disconnected; no automatic reconnection.
    ManuallyClosed,
}

impl ConnectionState {
    /// Whether frames may be written in this state.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::ManuallyClosed => write!(f, "manually_closed"),
        }
    }
}
