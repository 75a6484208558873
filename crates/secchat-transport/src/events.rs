//! Events published by the session to its listeners.

use std::time::Duration;

use secchat_core::{Frame, SessionError};

/// Event name for a successful open.
pub const CONNECTED: &str = "connected";
/// Event name for a lost channel.
pub const DISCONNECTED: &str = "disconnected";
/// Event name for a scheduled retry.
pub const RECONNECTING: &str = "reconnecting";
/// Event name for an exhausted retry budget.
pub const RECONNECT_FAILED: &str = "reconnect_failed";
/// Event name for advisory errors (also used by server `error` frames).
pub const ERROR: &str = "error";
/// Event name for inbound user content.
pub const MESSAGE: &str = "message";
/// Event name for a server build tag change.
pub const VERSION_CHANGED: &str = "version_changed";

/// Something a listener may care about.
///
/// [`name`](Self::name) is the key listeners register under. Frames with no
/// special handling pass through as [`SessionEvent::Frame`] under their own
/// type, so `auth_success`, `typing`, `recall`, `read` and any future server
/// type are all subscribable by name.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A channel opened.
    Connected,
    /// The open channel was lost.
    Disconnected {
        /// Why the channel went away.
        reason: String,
    },
    /// A retry is scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// The retry budget is exhausted; the session rests until `connect()`.
    ReconnectFailed {
        /// Failed attempts made.
        attempts: u32,
    },
    /// Advisory, connection-level failure. The session recovers on its own.
    Error {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },
    /// Inbound `text` or `image` frame.
    Message(Frame),
    /// The server reported a different build tag than the baseline.
    VersionChanged {
        /// Baseline tag.
        previous: String,
        /// Newly observed tag, now the baseline.
        current: String,
    },
    /// Any other inbound frame.
    Frame(Frame),
}

impl SessionEvent {
    /// Dispatcher key for this event.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected => CONNECTED,
            Self::Disconnected { .. } => DISCONNECTED,
            Self::Reconnecting { .. } => RECONNECTING,
            Self::ReconnectFailed { .. } => RECONNECT_FAILED,
            Self::Error { .. } => ERROR,
            Self::Message(_) => MESSAGE,
            Self::VersionChanged { .. } => VERSION_CHANGED,
            Self::Frame(frame) => frame.kind.as_str(),
        }
    }

    /// The carried frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Self::Message(frame) | Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

impl From<&SessionError> for SessionEvent {
    fn from(err: &SessionError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
