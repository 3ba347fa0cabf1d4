//! Shared protocol definitions for the chatroom wire format.

pub mod event;
pub mod message;

/// Name of the single global room shared by the server and every client.
///
/// There is no room-selection parameter in the protocol; all clients join
/// this room. The registry is still keyed by room name so the membership
/// model stays honest about what multi-room support would look like.
pub const DEFAULT_ROOM: &str = "main";
