//! Chatroom relay server library.
//!
//! Exposes the relay server for use in tests and embedding. The server
//! accepts WebSocket connections, tracks membership of the single shared
//! room, and fans chat, typing, and presence events out to the other
//! members.

pub mod config;
pub mod relay;
pub mod rooms;
