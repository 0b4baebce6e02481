//! Room membership: groups connections by conversation key.

use std::collections::{HashMap, HashSet};

use crate::registry::ConnId;

/// Membership sets for broadcast rooms.
///
/// Direct-pair delivery is not tracked here; it is recomputed per send from
/// the registry's identity mapping. Empty rooms are pruned immediately.
#[derive(Debug, Default)]
pub struct Rooms {
    rooms: HashMap<String, HashSet<ConnId>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Idempotent.
    pub fn join(&mut self, conn_id: ConnId, room: &str) {
        self.rooms.entry(room.to_string()).or_default().insert(conn_id);
    }

    /// Remove a connection from a room. Idempotent; prunes the room when it
    /// empties.
    pub fn leave(&mut self, conn_id: ConnId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    /// Remove a connection from every room it joined.
    pub fn leave_all(&mut self, conn_id: ConnId) {
        self.rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Live connection handles joined to a room.
    pub fn members_of(&self, room: &str) -> Vec<ConnId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, conn_id: ConnId, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&conn_id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
