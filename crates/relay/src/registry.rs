//! Connection registry: maps live connections to identities.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::events::Outbound;

/// Opaque handle for one live transport connection.
pub type ConnId = u64;

/// Per-connection state owned by the registry.
#[derive(Debug)]
pub struct Connection {
    /// Identity claimed by the first join event, if any.
    pub identity: Option<String>,
    /// Room this connection fans out to once its identity is claimed.
    pub home_room: String,
    /// Writer-task handle for delivering frames to this connection.
    pub outbound: mpsc::Sender<Outbound>,
    /// Cleared by each liveness sweep, restored by a pong. A connection
    /// that stays cleared across two sweeps is reaped.
    pub responsive: bool,
}

/// In-memory map of live connections.
///
/// Owned exclusively by the relay actor; its only observable side effect is
/// that mutations make the presence set stale, which the relay rebroadcasts.
/// It never sends network messages itself.
#[derive(Debug, Default)]
pub struct Registry {
    conns: HashMap<ConnId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unclaimed entry for a fresh connection.
    pub fn register(&mut self, conn_id: ConnId, home_room: String, outbound: mpsc::Sender<Outbound>) {
        self.conns.insert(
            conn_id,
            Connection {
                identity: None,
                home_room,
                outbound,
                responsive: true,
            },
        );
    }

    /// Record the identity for a connection.
    ///
    /// Repeated claims overwrite the previous identity rather than fail;
    /// several connections (browser tabs) may share one identity. Returns
    /// false for connections that are no longer registered.
    pub fn claim_identity(&mut self, conn_id: ConnId, identity: &str) -> bool {
        match self.conns.get_mut(&conn_id) {
            Some(conn) => {
                conn.identity = Some(identity.to_string());
                true
            }
            None => false,
        }
    }

    /// Remove a connection. Safe to call repeatedly; duplicate disconnect
    /// signals are expected from the transport.
    pub fn unregister(&mut self, conn_id: ConnId) -> Option<Connection> {
        self.conns.remove(&conn_id)
    }

    /// Deduplicated set of claimed identities across live connections,
    /// sorted for stable output.
    pub fn identities_online(&self) -> Vec<String> {
        let mut identities: Vec<String> = self
            .conns
            .values()
            .filter_map(|conn| conn.identity.clone())
            .collect();
        identities.sort();
        identities.dedup();
        identities
    }

    /// Live connections whose claimed identity matches.
    pub fn connections_for(&self, identity: &str) -> Vec<ConnId> {
        self.conns
            .iter()
            .filter(|(_, conn)| conn.identity.as_deref() == Some(identity))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn get(&self, conn_id: ConnId) -> Option<&Connection> {
        self.conns.get(&conn_id)
    }

    pub fn get_mut(&mut self, conn_id: ConnId) -> Option<&mut Connection> {
        self.conns.get_mut(&conn_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &Connection)> {
        self.conns.iter().map(|(id, conn)| (*id, conn))
    }

    pub fn conn_ids(&self) -> Vec<ConnId> {
        self.conns.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}
