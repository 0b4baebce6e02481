//! The message relay actor.
//!
//! One task owns the connection registry and room membership outright and
//! processes transport events in arrival order over an mpsc command channel.
//! No locking is involved; connections and HTTP callers interact through
//! [`RelayHandle`]. History writes are awaited inside the actor turn and a
//! failed write never blocks fan-out.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pawline_config::RelayConfig;
use pawline_history::{HistoryStore, StoredMessage};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::events::{
    parse_frame, ClientEvent, InboundFrame, Outbound, PresenceChange, ServerEvent, GOING_AWAY,
    POLICY_VIOLATION,
};
use crate::registry::{ConnId, Registry};
use crate::rooms::Rooms;
use crate::types::{RelayError, RelayResult};

const COMMAND_CAPACITY: usize = 256;
const DEFAULT_MESSAGE_TYPE: &str = "text";

/// Tunables carried into the relay actor.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Interval between liveness sweeps.
    pub heartbeat: Duration,
    /// Messages replayed to a connection on join.
    pub history_limit: u32,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Room key for connections that do not name a conversation.
    pub default_room: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(RelayConfig::default())
    }
}

impl From<RelayConfig> for RelaySettings {
    fn from(config: RelayConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.heartbeat_seconds),
            history_limit: config.history_limit,
            outbound_capacity: config.outbound_capacity,
            default_room: config.default_room,
        }
    }
}

/// Reject connect parameters that name a conversation without an identity.
pub fn validate_connect(room: Option<&str>, identity: Option<&str>) -> RelayResult<()> {
    let has_room = room.is_some_and(|r| !r.is_empty());
    let has_identity = identity.is_some_and(|i| !i.is_empty());

    if has_room && !has_identity {
        return Err(RelayError::AnonymousJoin);
    }
    Ok(())
}

enum Command {
    Connect {
        conn_id: ConnId,
        room: Option<String>,
        identity: Option<String>,
        outbound: mpsc::Sender<Outbound>,
    },
    Frame {
        conn_id: ConnId,
        raw: String,
    },
    Pong {
        conn_id: ConnId,
    },
    Disconnect {
        conn_id: ConnId,
    },
    Publish {
        room: Option<String>,
        identity: String,
        content: String,
    },
}

/// Cloneable handle for talking to the relay actor.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Command>,
    next_conn_id: Arc<AtomicU64>,
    outbound_capacity: usize,
}

impl RelayHandle {
    /// Allocate a fresh connection handle.
    pub fn next_conn_id(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create the outbound queue for a new connection's writer task.
    pub fn outbound_channel(&self) -> (mpsc::Sender<Outbound>, mpsc::Receiver<Outbound>) {
        mpsc::channel(self.outbound_capacity)
    }

    /// Register a fresh connection. An identity supplied at connect time
    /// counts as its join event.
    pub async fn connect(
        &self,
        conn_id: ConnId,
        room: Option<String>,
        identity: Option<String>,
        outbound: mpsc::Sender<Outbound>,
    ) {
        let _ = self
            .tx
            .send(Command::Connect {
                conn_id,
                room,
                identity,
                outbound,
            })
            .await;
    }

    /// Forward a raw inbound text frame.
    pub async fn frame(&self, conn_id: ConnId, raw: String) {
        let _ = self.tx.send(Command::Frame { conn_id, raw }).await;
    }

    /// Record a transport-level liveness acknowledgement.
    pub async fn pong(&self, conn_id: ConnId) {
        let _ = self.tx.send(Command::Pong { conn_id }).await;
    }

    /// Tear down a connection. Duplicate signals are tolerated.
    pub async fn disconnect(&self, conn_id: ConnId) {
        let _ = self.tx.send(Command::Disconnect { conn_id }).await;
    }

    /// Persist and broadcast a message on behalf of a non-connection caller
    /// (the REST surface). Fire-and-forget.
    pub async fn publish(&self, room: Option<String>, identity: String, content: String) {
        let _ = self
            .tx
            .send(Command::Publish {
                room,
                identity,
                content,
            })
            .await;
    }
}

/// The relay actor. Construct with [`Relay::new`], then hand off to
/// `tokio::spawn(relay.run())`.
pub struct Relay<S: HistoryStore> {
    settings: RelaySettings,
    store: S,
    registry: Registry,
    rooms: Rooms,
    rx: mpsc::Receiver<Command>,
}

impl<S: HistoryStore> Relay<S> {
    pub fn new(store: S, settings: RelaySettings) -> (RelayHandle, Self) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = RelayHandle {
            tx,
            next_conn_id: Arc::new(AtomicU64::new(1)),
            outbound_capacity: settings.outbound_capacity,
        };

        let relay = Self {
            settings,
            store,
            registry: Registry::new(),
            rooms: Rooms::new(),
            rx,
        };

        (handle, relay)
    }

    /// Drive the actor until every handle is dropped.
    pub async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.settings.heartbeat);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            heartbeat = ?self.settings.heartbeat,
            history_limit = self.settings.history_limit,
            "relay actor started"
        );

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }

        info!("relay actor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                conn_id,
                room,
                identity,
                outbound,
            } => self.handle_connect(conn_id, room, identity, outbound).await,
            Command::Frame { conn_id, raw } => self.handle_frame(conn_id, raw).await,
            Command::Pong { conn_id } => self.handle_pong(conn_id),
            Command::Disconnect { conn_id } => self.purge(conn_id),
            Command::Publish {
                room,
                identity,
                content,
            } => self.handle_publish(room, identity, content).await,
        }
    }

    async fn handle_connect(
        &mut self,
        conn_id: ConnId,
        room: Option<String>,
        identity: Option<String>,
        outbound: mpsc::Sender<Outbound>,
    ) {
        let home_room = room
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.settings.default_room.clone());

        self.registry.register(conn_id, home_room, outbound);
        debug!(conn_id, "connection registered");

        if let Some(identity) = identity.filter(|i| !i.is_empty()) {
            self.handle_join(conn_id, identity).await;
        }
    }

    async fn handle_frame(&mut self, conn_id: ConnId, raw: String) {
        match parse_frame(&raw) {
            InboundFrame::Event(ClientEvent::Join { identity }) => {
                self.handle_join(conn_id, identity).await;
            }
            InboundFrame::Event(ClientEvent::Send {
                recipient,
                content,
                message_type,
            }) => {
                self.handle_send(conn_id, recipient, content, message_type)
                    .await;
            }
            InboundFrame::Event(ClientEvent::LoadPrivateHistory { peer }) => {
                self.handle_private_history(conn_id, peer).await;
            }
            // Malformed payloads degrade to plain text and are relayed
            // rather than rejected.
            InboundFrame::PlainText(text) => {
                self.handle_send(conn_id, None, text, None).await;
            }
        }
    }

    async fn handle_join(&mut self, conn_id: ConnId, identity: String) {
        if identity.is_empty() {
            warn!(conn_id, "join without identity, closing connection");
            self.close(conn_id, POLICY_VIOLATION, "identity required");
            return;
        }

        let home_room = match self.registry.get(conn_id) {
            Some(conn) => conn.home_room.clone(),
            None => return,
        };

        self.registry.claim_identity(conn_id, &identity);
        self.rooms.join(conn_id, &home_room);
        info!(conn_id, identity = %identity, room = %home_room, "identity claimed");

        self.broadcast_presence();
        self.notify_room(&home_room, conn_id, PresenceChange::Join, &identity);
        self.replay_history(conn_id, &home_room).await;
    }

    async fn handle_send(
        &mut self,
        conn_id: ConnId,
        recipient: Option<String>,
        content: String,
        message_type: Option<String>,
    ) {
        let (sender, room) = match self.registry.get(conn_id) {
            Some(conn) => match &conn.identity {
                Some(identity) => (identity.clone(), conn.home_room.clone()),
                None => {
                    debug!(conn_id, "dropping send from unidentified connection");
                    return;
                }
            },
            None => return,
        };

        // Id and timestamp are assigned exactly once; every fan-out copy of
        // this message is identical.
        let message = StoredMessage::assign(&room, &sender, recipient, content);
        self.persist(&message).await;

        let message_type = message_type.unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string());
        let event = ServerEvent::message(&message, &message_type);

        match message.recipient.as_deref() {
            Some(recipient) => self.deliver_direct(&message.sender, recipient, &event),
            None => self.deliver_room(&room, Some(conn_id), &event),
        }
    }

    async fn handle_private_history(&mut self, conn_id: ConnId, peer: String) {
        let Some(identity) = self.registry.get(conn_id).and_then(|c| c.identity.clone()) else {
            debug!(conn_id, "dropping history request from unidentified connection");
            return;
        };

        let messages = match self.store.between(&identity, &peer).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, identity = %identity, peer = %peer,
                    "private history query failed, sending empty history");
                Vec::new()
            }
        };

        self.deliver(
            conn_id,
            Outbound::Event(ServerEvent::PrivateHistory { messages }),
        );
    }

    async fn handle_publish(&mut self, room: Option<String>, identity: String, content: String) {
        let room = room
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.settings.default_room.clone());

        let message = StoredMessage::assign(&room, &identity, None, content);
        self.persist(&message).await;

        let event = ServerEvent::message(&message, DEFAULT_MESSAGE_TYPE);
        self.deliver_room(&room, None, &event);
    }

    fn handle_pong(&mut self, conn_id: ConnId) {
        if let Some(conn) = self.registry.get_mut(conn_id) {
            conn.responsive = true;
        }
    }

    /// Liveness sweep: reap connections that missed the previous sweep's
    /// ping, then ping the survivors.
    fn sweep(&mut self) {
        let stale: Vec<ConnId> = self
            .registry
            .iter()
            .filter(|(_, conn)| !conn.responsive)
            .map(|(id, _)| id)
            .collect();

        for conn_id in stale {
            warn!(conn_id, "liveness check failed twice, terminating");
            self.close(conn_id, GOING_AWAY, "liveness check failed");
        }

        for conn_id in self.registry.conn_ids() {
            if let Some(conn) = self.registry.get_mut(conn_id) {
                conn.responsive = false;
            }
            self.deliver(conn_id, Outbound::Ping);
        }
    }

    /// Send a close frame and purge the connection.
    fn close(&mut self, conn_id: ConnId, code: u16, reason: &str) {
        self.deliver(
            conn_id,
            Outbound::Close {
                code,
                reason: reason.to_string(),
            },
        );
        self.purge(conn_id);
    }

    /// Remove a connection from registry and rooms, and rebroadcast
    /// presence if it had claimed an identity. Idempotent.
    fn purge(&mut self, conn_id: ConnId) {
        let Some(conn) = self.registry.unregister(conn_id) else {
            return;
        };
        self.rooms.leave_all(conn_id);
        debug!(conn_id, "connection purged");

        if let Some(identity) = conn.identity {
            self.broadcast_presence();
            self.notify_room(&conn.home_room, conn_id, PresenceChange::Leave, &identity);
        }
    }

    async fn persist(&self, message: &StoredMessage) {
        if let Err(e) = self.store.append(message).await {
            // Fan-out proceeds regardless; the message will be missing from
            // later replay until the store recovers.
            error!(id = %message.id, error = %e, "history append failed");
        }
    }

    async fn replay_history(&self, conn_id: ConnId, room: &str) {
        let messages = match self.store.recent(room, self.settings.history_limit).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, room = %room, "history replay failed, sending empty history");
                Vec::new()
            }
        };

        self.deliver(conn_id, Outbound::Event(ServerEvent::History { messages }));
    }

    /// Recompute the presence set and send it in full to every live
    /// connection.
    fn broadcast_presence(&self) {
        let users = self.registry.identities_online();
        debug!(online = users.len(), "broadcasting presence");

        let event = ServerEvent::Presence { users };
        for conn_id in self.registry.conn_ids() {
            self.deliver(conn_id, Outbound::Event(event.clone()));
        }
    }

    fn notify_room(&self, room: &str, exclude: ConnId, change: PresenceChange, identity: &str) {
        let event = ServerEvent::PresenceNotice {
            event: change,
            identity: identity.to_string(),
        };
        for conn_id in self.rooms.members_of(room) {
            if conn_id != exclude {
                self.deliver(conn_id, Outbound::Event(event.clone()));
            }
        }
    }

    fn deliver_room(&self, room: &str, exclude: Option<ConnId>, event: &ServerEvent) {
        for conn_id in self.rooms.members_of(room) {
            if Some(conn_id) != exclude {
                self.deliver(conn_id, Outbound::Event(event.clone()));
            }
        }
    }

    /// Directed delivery: every live connection claimed by the sender or the
    /// recipient, resolved from identity, no room membership required.
    fn deliver_direct(&self, sender: &str, recipient: &str, event: &ServerEvent) {
        let mut targets: HashSet<ConnId> =
            self.registry.connections_for(sender).into_iter().collect();
        targets.extend(self.registry.connections_for(recipient));

        for conn_id in targets {
            self.deliver(conn_id, Outbound::Event(event.clone()));
        }
    }

    /// Best-effort, at-most-once delivery to one connection. A full or
    /// closed queue skips that peer only.
    fn deliver(&self, conn_id: ConnId, outbound: Outbound) {
        let Some(conn) = self.registry.get(conn_id) else {
            return;
        };

        match conn.outbound.try_send(outbound) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id, "outbound queue full, skipping peer");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id, "outbound channel closed, skipping peer");
            }
        }
    }
}
