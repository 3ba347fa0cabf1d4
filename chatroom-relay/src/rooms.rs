//! Room registry for the relay server.
//!
//! Maintains the authoritative membership map: room name to the set of
//! member connections and the display name each joined under. This is the
//! only structure touched by more than one connection's activity, so every
//! operation goes through the single [`RwLock`]; joins, leaves, and
//! recipient reads on the same room are serialized against each other.
//!
//! Entries are ephemeral -- lost on relay restart. Rooms are created lazily
//! on first join and never destroyed; an empty member map lingering for the
//! process lifetime is harmless.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory map of room name -> member connection id -> display name.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, HashMap<Uuid, String>>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Creates a new, empty room registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a connection to a room, creating the room entry if absent.
    ///
    /// Idempotent with respect to membership: joining twice leaves the set
    /// unchanged apart from re-applying the display name. Returns the
    /// previously stored name when the connection was already a member, so
    /// callers can tell a duplicate join from a first join.
    pub async fn join(&self, room: &str, conn_id: Uuid, display_name: &str) -> Option<String> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id, display_name.to_string())
    }

    /// Removes a connection from a room's member set.
    ///
    /// Returns the display name the member joined under, or `None` if the
    /// connection was not a member. Teardown runs from several exit paths
    /// (explicit leave, transport close, failed write); this `Option` is
    /// what keeps the removal and its notification exactly-once.
    pub async fn leave(&self, room: &str, conn_id: Uuid) -> Option<String> {
        let mut rooms = self.rooms.write().await;
        rooms.get_mut(room)?.remove(&conn_id)
    }

    /// Returns the member connection ids of a room, excluding the given one.
    ///
    /// A sender never echoes to itself through the relay; every broadcast
    /// resolves its recipients through this method.
    pub async fn members_except(&self, room: &str, conn_id: Uuid) -> Vec<Uuid> {
        let rooms = self.rooms.read().await;
        rooms.get(room).map_or_else(Vec::new, |members| {
            members.keys().copied().filter(|id| *id != conn_id).collect()
        })
    }

    /// Returns the display name a connection joined a room under, if any.
    ///
    /// Doubles as the membership check gating chat and typing relay.
    pub async fn display_name(&self, room: &str, conn_id: Uuid) -> Option<String> {
        let rooms = self.rooms.read().await;
        rooms.get(room)?.get(&conn_id).cloned()
    }

    /// Returns the number of members currently in a room.
    pub async fn member_count(&self, room: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map_or(0, HashMap::len)
    }
}
