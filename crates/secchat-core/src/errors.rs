//! Error taxonomy for the client transport.
//!
//! - [`SessionError`]: failures surfaced to the caller of a session operation
//! - [`DecodeError`]: a malformed inbound frame (logged by the session, never surfaced)
//!
//! Connection-level variants (`ConnectTimeout`, `ConnectError`,
//! `HeartbeatTimeout`) are recovered by the reconnect scheduler; per-message
//! variants (`DeliveryTimeout`, `NotConnected`) go back to the one caller that
//! issued the send.

use std::time::Duration;

use thiserror::Error;

/// Maximum number of characters of a bad frame kept for diagnostics.
const PREVIEW_CHARS: usize = 64;

/// Errors returned by session operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No open signal arrived within the connect timeout.
    #[error("connection to {url} timed out after {after:?}")]
    ConnectTimeout {
        /// Target address.
        url: String,
        /// Bound that elapsed.
        after: Duration,
    },

    /// The transport failed before the channel opened.
    #[error("connection to {url} failed: {message}")]
    ConnectError {
        /// Target address.
        url: String,
        /// Transport-reported reason.
        message: String,
    },

    /// A tracked send was not acknowledged in time.
    #[error("message {id} was not acknowledged within {after:?}")]
    DeliveryTimeout {
        /// Correlation ID of the message.
        id: String,
        /// Bound that elapsed.
        after: Duration,
    },

    /// A send was attempted while no channel was open.
    #[error("not connected")]
    NotConnected,

    /// The dead-man's switch fired.
    #[error("no inbound traffic for {after:?}")]
    HeartbeatTimeout {
        /// Bound that elapsed.
        after: Duration,
    },

    /// A pending connect was abandoned by `disconnect()`.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// The session task has stopped.
    #[error("session task has shut down")]
    SessionClosed,
}

impl SessionError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectTimeout { .. } => "CONNECT_TIMEOUT",
            Self::ConnectError { .. } => "CONNECT_ERROR",
            Self::DeliveryTimeout { .. } => "DELIVERY_TIMEOUT",
            Self::NotConnected => "NOT_CONNECTED",
            Self::HeartbeatTimeout { .. } => "HEARTBEAT_TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// Whether the reconnect scheduler recovers from this error on its own.
    #[must_use]
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::ConnectError { .. } | Self::HeartbeatTimeout { .. }
        )
    }
}

/// An inbound frame that could not be decoded.
#[derive(Debug, Error)]
#[error("malformed frame ({preview:?}): {source}")]
pub struct DecodeError {
    /// Leading characters of the offending payload.
    pub preview: String,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}

impl DecodeError {
    /// Wrap a JSON error, keeping a short preview of the payload.
    #[must_use]
    pub fn new(text: &str, source: serde_json::Error) -> Self {
        Self {
            preview: text.chars().take(PREVIEW_CHARS).collect(),
            source,
        }
    }
}
