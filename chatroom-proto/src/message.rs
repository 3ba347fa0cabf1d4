//! Chat message payload relayed between room members.
//!
//! The relay never rewrites these fields: `id` and `time` are produced by
//! the sending client and passed through verbatim. A malicious client can
//! therefore forge `sender` or `time`; that trust boundary is accepted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a message, based on UUID v7 for time-ordering.
///
/// Uniqueness is the only property the relay relies on. This helper exists
/// for client implementations; the server treats `ChatMessage::id` as an
/// opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new time-ordered message identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message as it appears on the wire.
///
/// Field names are normative; clients in other languages depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique token assigned by the sending client.
    pub id: String,
    /// Display name of the sender, as the sender claims it.
    pub sender: String,
    /// Message body text.
    pub message: String,
    /// Client-local send time, already formatted for display.
    pub time: String,
}

impl ChatMessage {
    /// Builds a message with a fresh [`MessageId`], for client use.
    #[must_use]
    pub fn new(sender: impl Into<String>, message: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            id: MessageId::new().to_string(),
            sender: sender.into(),
            message: message.into(),
            time: time.into(),
        }
    }
}
