//! Wire events exchanged between chat clients and the relay server.
//!
//! Frames are JSON text of the form `{"event": <name>, "data": <payload>}`.
//! Event names are normative: clients written against the original
//! socket.io-style protocol must interoperate without translation.

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Error type for wire event encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Events a client sends to the relay.
///
/// Everything except [`ClientEvent::Join`] requires the connection to have
/// joined the room first; the relay drops pre-join events silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Declare a display name and enter the shared room.
    #[serde(rename = "joinChatRoom")]
    Join(String),

    /// A chat message to fan out to the other room members.
    #[serde(rename = "chatMessage")]
    Chat(ChatMessage),

    /// The named user started typing.
    #[serde(rename = "userTyping")]
    Typing(String),

    /// The named user stopped typing.
    #[serde(rename = "userStopTyping")]
    StopTyping(String),

    /// Explicitly leave the room (the connection may stay open).
    #[serde(rename = "userLeaveChatRoom")]
    Leave(String),
}

/// Events the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Presence notice: the named user just joined the room.
    #[serde(rename = "chatRoomNews")]
    News(String),

    /// A chat message from another member, relayed verbatim.
    #[serde(rename = "chatMessage")]
    Chat(ChatMessage),

    /// Another member started typing.
    #[serde(rename = "userTyping")]
    Typing(String),

    /// Another member stopped typing.
    #[serde(rename = "userStopTyping")]
    StopTyping(String),

    /// The named member left the room or disconnected.
    #[serde(rename = "userLeaveChatRoom")]
    Leave(String),
}

/// Encodes a [`ServerEvent`] into a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode(event: &ServerEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientEvent`] from a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the frame is not valid JSON or
/// names an unknown event.
pub fn decode(text: &str) -> Result<ClientEvent, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}
