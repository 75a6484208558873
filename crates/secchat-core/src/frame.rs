//! Wire frames exchanged with the chat server.
//!
//! Every frame is a JSON object with a `type` field. Known types get a
//! [`FrameKind`] variant; anything else round-trips through
//! [`FrameKind::Other`] so new server message types pass straight through to
//! listeners. All remaining fields are kept as an untyped JSON map.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::ids::MessageId;

// ─────────────────────────────────────────────────────────────────────────────
// FrameKind
// ─────────────────────────────────────────────────────────────────────────────

/// The `type` discriminator of a frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameKind {
    /// Outbound authentication request.
    Auth,
    /// Server accepted the credentials.
    AuthSuccess,
    /// Heartbeat ping.
    Ping,
    /// Heartbeat reply, may carry the server build tag.
    Pong,
    /// Text message (user content).
    Text,
    /// Image message (user content).
    Image,
    /// Ephemeral typing notice.
    Typing,
    /// Recall of a prior message.
    Recall,
    /// Read receipt.
    Read,
    /// Server-reported failure.
    Error,
    /// Any type this client has no special handling for.
    Other(String),
}

impl FrameKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auth => "auth",
            Self::AuthSuccess => "auth_success",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Text => "text",
            Self::Image => "image",
            Self::Typing => "typing",
            Self::Recall => "recall",
            Self::Read => "read",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }

    /// Whether frames of this kind carry user content (and a correlation ID).
    #[must_use]
    pub fn is_user_content(&self) -> bool {
        matches!(self, Self::Text | Self::Image)
    }
}

impl From<String> for FrameKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "auth" => Self::Auth,
            "auth_success" => Self::AuthSuccess,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "text" => Self::Text,
            "image" => Self::Image,
            "typing" => Self::Typing,
            "recall" => Self::Recall,
            "read" => Self::Read,
            "error" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for FrameKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<FrameKind> for String {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame
// ─────────────────────────────────────────────────────────────────────────────

/// A single structured message exchanged over the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame type.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Every other field, untyped.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Frame {
    /// Create an empty frame of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<FrameKind>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.fields.insert(key.into(), value.into());
        self
    }

    /// Raw field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field lookup; non-string values yield `None`.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Correlation identifier, if present and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.str_field("id").filter(|id| !id.is_empty())
    }

    /// Server build tag carried by `pong` frames.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.str_field("version").filter(|v| !v.is_empty())
    }

    /// Message content of a user-content frame.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    /// Human-readable message of an `error` frame.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    /// Serialize to the wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a frame from its wire form.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|source| DecodeError::new(text, source))
    }

    // ── Outbound constructors ───────────────────────────────────────────

    /// `auth` frame carrying the credentials payload.
    #[must_use]
    pub fn auth(credentials: &AuthCredentials) -> Self {
        let payload = serde_json::to_value(credentials).unwrap_or(Value::Null);
        Self::new(FrameKind::Auth).with("payload", payload)
    }

    /// Heartbeat ping.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(FrameKind::Ping)
    }

    /// Typing notice.
    #[must_use]
    pub fn typing() -> Self {
        Self::new(FrameKind::Typing)
    }

    /// Request recall of a prior message.
    #[must_use]
    pub fn recall(id: &str) -> Self {
        Self::new(FrameKind::Recall).with("id", id)
    }

    /// Read receipt for a message.
    #[must_use]
    pub fn read(id: &str) -> Self {
        Self::new(FrameKind::Read).with("id", id)
    }

    /// User-content frame: `{type, id, content, timestamp, ...options}`.
    ///
    /// Extra option fields are applied last and may override the defaults.
    #[must_use]
    pub fn chat(
        kind: FrameKind,
        id: &MessageId,
        content: impl Into<String>,
        options: &SendOptions,
    ) -> Self {
        let mut frame = Self::new(kind)
            .with("id", id.as_str())
            .with("content", content.into())
            .with("timestamp", chrono::Utc::now().timestamp_millis());
        if let Some(reply_to) = &options.reply_to {
            frame = frame.with("replyTo", reply_to.as_str());
        }
        if !options.mentions.is_empty() {
            frame = frame.with("mentions", options.mentions.clone());
        }
        for (key, value) in &options.extra {
            let _ = frame.fields.insert(key.clone(), value.clone());
        }
        frame
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthCredentials
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials replayed on every (re)connect until an explicit disconnect.
///
/// Opaque to the transport. The `Debug` impl redacts the password hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCredentials {
    /// SHA-256 hex of the shared room password.
    pub password_hash: String,
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// Avatar reference, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl AuthCredentials {
    /// Create credentials without an avatar.
    #[must_use]
    pub fn new(
        password_hash: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            password_hash: password_hash.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            avatar: None,
        }
    }

    /// Attach an avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("password_hash", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("avatar", &self.avatar)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SendOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Options for a user-content send.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendOptions {
    /// Caller-supplied correlation ID; a fresh one is generated when absent.
    pub id: Option<MessageId>,
    /// ID of the message being replied to.
    pub reply_to: Option<String>,
    /// Mentioned user IDs.
    pub mentions: Vec<String>,
    /// Additional fields merged into the frame.
    pub extra: Map<String, Value>,
}

impl SendOptions {
    /// Use a specific correlation ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Mark the message as a reply.
    #[must_use]
    pub fn reply_to(mut self, id: impl Into<String>) -> Self {
        self.reply_to = Some(id.into());
        self
    }

    /// Mention a user.
    #[must_use]
    pub fn mention(mut self, user_id: impl Into<String>) -> Self {
        self.mentions.push(user_id.into());
        self
    }

    /// Add an arbitrary extra field.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.extra.insert(key.into(), value.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
