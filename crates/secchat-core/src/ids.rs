//! Correlation identifiers for outbound user content.
//!
//! A [`MessageId`] links an outbound `text`/`image` frame to the echo the
//! server sends back once it has accepted the message. Fresh IDs are UUID v7
//! so they sort by creation time; caller-supplied IDs are carried verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifier for a tracked message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for MessageId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_ids_are_unique() {
        let ids: HashSet<MessageId> = (0..100).map(|_| MessageId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn new_id_is_uuid_v7() {
        let id = MessageId::new();
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn caller_supplied_id_is_verbatim() {
        let id = MessageId::from("m1");
        assert_eq!(id.as_str(), "m1");
        assert_eq!(id.to_string(), "m1");
        assert_eq!(String::from(id), "m1");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = MessageId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: MessageId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn deref_to_str() {
        let id = MessageId::from("xyz");
        assert!(id.starts_with("xy"));
    }
}
