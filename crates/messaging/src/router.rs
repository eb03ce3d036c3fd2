//! Room and presence routing for live connections.
//!
//! A room holds the connections joined to one conversation. Every
//! connection is also reachable through its user's personal channel.
//! [`RoomRouter`] is the seam for swapping the per-process registry for a
//! shared publish/subscribe layer.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use gigboard_auth::Identity;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live connection with the identity bound at handshake.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: Identity,
    outbound: mpsc::Sender<ServerEvent>,
    eviction: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    pub fn new(identity: Identity, outbound: mpsc::Sender<ServerEvent>) -> Self {
        let (eviction, _) = watch::channel(false);
        Self {
            id: ConnectionId::new(),
            identity,
            outbound,
            eviction: Arc::new(eviction),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Queue an event for this connection only. Returns `false` once the
    /// connection's writer has gone away or the router has evicted it.
    pub async fn send(&self, event: ServerEvent) -> bool {
        if self.is_evicted() {
            return false;
        }
        tokio::select! {
            sent = self.outbound.send(event) => sent.is_ok(),
            _ = self.evicted() => false,
        }
    }

    pub fn outbound(&self) -> mpsc::Sender<ServerEvent> {
        self.outbound.clone()
    }

    pub fn is_evicted(&self) -> bool {
        *self.eviction.borrow()
    }

    /// Resolves once the router has dropped this connection for falling
    /// behind. The transport should close the socket; the client recovers
    /// the gap from history after reconnecting.
    pub async fn evicted(&self) {
        let mut receiver = self.eviction.subscribe();
        let _ = receiver.wait_for(|evicted| *evicted).await;
    }

    fn evict(&self) {
        self.eviction.send_replace(true);
    }
}

#[async_trait]
pub trait RoomRouter: Send + Sync {
    /// Make the connection reachable through its user's personal channel.
    async fn register(&self, connection: &ConnectionHandle);

    /// Add the connection to a conversation room. Authorization is the
    /// caller's job.
    async fn join(&self, connection: &ConnectionHandle, conversation_id: &str);

    async fn leave(&self, connection_id: ConnectionId, conversation_id: &str);

    /// Deliver to every connection in the room without waiting. Returns the
    /// number of connections that accepted the event. A connection whose
    /// queue is full is evicted instead of being waited on.
    fn broadcast(&self, conversation_id: &str, event: ServerEvent) -> usize;

    /// Deliver to every live connection of a user, same policy as
    /// [`RoomRouter::broadcast`].
    fn notify_user(&self, user_id: &str, event: ServerEvent) -> usize;

    /// Remove the connection from every room and from its personal channel.
    async fn disconnect(&self, connection_id: ConnectionId);

    async fn shutdown(&self);

    fn room_size(&self, conversation_id: &str) -> usize;

    fn connection_count(&self) -> usize;
}

struct ConnectionEntry {
    handle: ConnectionHandle,
    rooms: HashSet<String>,
}

impl ConnectionEntry {
    fn new(connection: &ConnectionHandle) -> Self {
        Self {
            handle: connection.clone(),
            rooms: HashSet::new(),
        }
    }
}

type Members = HashMap<ConnectionId, mpsc::Sender<ServerEvent>>;

/// Per-process registry backed by sharded concurrent maps.
///
/// No map guard is ever held across an `.await`, and delivery never waits:
/// senders are cloned out first and fed with `try_send`.
#[derive(Default)]
pub struct InMemoryRouter {
    rooms: DashMap<String, Members>,
    personal: DashMap<String, Members>,
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl InMemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_member(map: &DashMap<String, Members>, key: &str, id: ConnectionId, tx: mpsc::Sender<ServerEvent>) {
        map.entry(key.to_string()).or_default().insert(id, tx);
    }

    fn remove_member(map: &DashMap<String, Members>, key: &str, id: ConnectionId) {
        if let Some(mut members) = map.get_mut(key) {
            members.remove(&id);
        }
        map.remove_if(key, |_, members| members.is_empty());
    }

    fn snapshot(map: &DashMap<String, Members>, key: &str) -> Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> {
        map.get(key)
            .map(|members| {
                members
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deliver(&self, targets: Vec<(ConnectionId, mpsc::Sender<ServerEvent>)>, event: ServerEvent) -> usize {
        let mut delivered = 0;
        for (connection_id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%connection_id, "outbound queue full, evicting connection");
                    self.evict(connection_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%connection_id, "connection writer already closed");
                }
            }
        }
        delivered
    }

    /// Drop a lagging connection from every map and signal its transport.
    fn evict(&self, connection_id: ConnectionId) {
        if let Some(entry) = self.remove_connection(connection_id) {
            entry.handle.evict();
        }
    }

    fn remove_connection(&self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        let (_, entry) = self.connections.remove(&connection_id)?;

        for conversation_id in &entry.rooms {
            Self::remove_member(&self.rooms, conversation_id, connection_id);
        }
        Self::remove_member(&self.personal, entry.handle.user_id(), connection_id);

        debug!(
            %connection_id,
            user_id = entry.handle.user_id(),
            rooms = entry.rooms.len(),
            "connection removed from router"
        );
        Some(entry)
    }
}

#[async_trait]
impl RoomRouter for InMemoryRouter {
    async fn register(&self, connection: &ConnectionHandle) {
        self.connections
            .entry(connection.id)
            .or_insert_with(|| ConnectionEntry::new(connection));
        Self::insert_member(
            &self.personal,
            connection.user_id(),
            connection.id,
            connection.outbound(),
        );
        debug!(connection_id = %connection.id, user_id = connection.user_id(), "connection registered");
    }

    async fn join(&self, connection: &ConnectionHandle, conversation_id: &str) {
        let outbound = {
            let mut entry = self
                .connections
                .entry(connection.id)
                .or_insert_with(|| ConnectionEntry::new(connection));
            entry.rooms.insert(conversation_id.to_string());
            entry.handle.outbound()
        };
        Self::insert_member(&self.rooms, conversation_id, connection.id, outbound);
        debug!(connection_id = %connection.id, conversation_id, "joined room");
    }

    async fn leave(&self, connection_id: ConnectionId, conversation_id: &str) {
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.rooms.remove(conversation_id);
        }
        Self::remove_member(&self.rooms, conversation_id, connection_id);
        debug!(%connection_id, conversation_id, "left room");
    }

    fn broadcast(&self, conversation_id: &str, event: ServerEvent) -> usize {
        let targets = Self::snapshot(&self.rooms, conversation_id);
        self.deliver(targets, event)
    }

    fn notify_user(&self, user_id: &str, event: ServerEvent) -> usize {
        let targets = Self::snapshot(&self.personal, user_id);
        self.deliver(targets, event)
    }

    async fn disconnect(&self, connection_id: ConnectionId) {
        self.remove_connection(connection_id);
    }

    async fn shutdown(&self) {
        let connections = self.connections.len();
        self.rooms.clear();
        self.personal.clear();
        self.connections.clear();
        info!(connections, "room router shut down");
    }

    fn room_size(&self, conversation_id: &str) -> usize {
        self.rooms
            .get(conversation_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
