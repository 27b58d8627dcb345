//! WebSocket connection tracking and room fan-out
//!
//! Each socket gets an unbounded channel drained by its send task. The
//! broadcaster only pushes into channels, so fan-out never blocks on a slow
//! socket and a closed channel marks a dead connection.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::ServerEvent;
use crate::services::registry::normalize_code;

/// Handle for sending events to one WebSocket connection
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Channel drained by the connection's send task
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// When this connection was established (Unix timestamp ms)
    pub connected_at: i64,

    /// Last activity timestamp (atomic for thread-safe updates)
    pub last_activity: Arc<AtomicI64>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            sender,
            connected_at: now,
            last_activity: Arc::new(AtomicI64::new(now)),
        }
    }

    /// Update last activity timestamp
    pub fn touch(&self) {
        self.last_activity
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    #[allow(clippy::result_large_err)]
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Connections of every room, keyed by room code then connection id
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct RoomBroadcaster {
    rooms: Arc<DashMap<String, DashMap<Uuid, ConnectionHandle>>>,
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a room
    pub fn add_connection(
        &self,
        code: &str,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        let code = normalize_code(code);
        self.rooms
            .entry(code.clone())
            .or_default()
            .insert(connection_id, ConnectionHandle::new(sender));

        tracing::debug!(
            code = %code,
            connection_id = %connection_id,
            connections = self.connection_count(&code),
            "Connection added"
        );
    }

    /// Remove a connection, dropping the room entry once empty
    pub fn remove_connection(&self, code: &str, connection_id: Uuid) -> bool {
        let code = normalize_code(code);
        let Some(connections) = self.rooms.get(&code) else {
            return false;
        };
        let removed = connections.remove(&connection_id).is_some();
        let is_empty = connections.is_empty();
        drop(connections);

        if is_empty {
            self.rooms.remove_if(&code, |_, conns| conns.is_empty());
        }
        if removed {
            tracing::debug!(code = %code, connection_id = %connection_id, "Connection removed");
        }
        removed
    }

    /// Send to every connection of a room, pruning dead ones
    ///
    /// Returns the number of connections that accepted the event.
    pub fn broadcast(&self, code: &str, event: ServerEvent) -> usize {
        let code = normalize_code(code);
        let Some(connections) = self.rooms.get(&code) else {
            return 0;
        };

        let mut sent = 0;
        let mut dead = Vec::new();
        for entry in connections.iter() {
            match entry.value().send(event.clone()) {
                Ok(()) => sent += 1,
                Err(_) => dead.push(*entry.key()),
            }
        }
        for connection_id in &dead {
            connections.remove(connection_id);
        }
        drop(connections);

        if !dead.is_empty() {
            tracing::debug!(
                code = %code,
                event = event.name(),
                pruned = dead.len(),
                "Pruned dead connections"
            );
        }
        sent
    }

    /// Broadcast a batch of events in order
    pub fn broadcast_all(&self, code: &str, events: Vec<ServerEvent>) {
        for event in events {
            self.broadcast(code, event);
        }
    }

    /// Send to a single connection
    pub fn send_to(&self, code: &str, connection_id: Uuid, event: ServerEvent) -> Result<(), SendError> {
        let code = normalize_code(code);
        let connections = self.rooms.get(&code).ok_or(SendError::RoomNotFound)?;
        let handle = connections
            .get(&connection_id)
            .ok_or(SendError::ConnectionNotFound)?;
        handle.send(event).map_err(|_| SendError::ConnectionClosed)
    }

    /// Record activity on a connection
    pub fn touch(&self, code: &str, connection_id: Uuid) -> bool {
        self.rooms
            .get(&normalize_code(code))
            .and_then(|conns| conns.get(&connection_id).map(|handle| handle.touch()))
            .is_some()
    }

    pub fn connection_count(&self, code: &str) -> usize {
        self.rooms
            .get(&normalize_code(code))
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.rooms.iter().map(|e| e.value().len()).sum()
    }

    /// Forget every connection of a room
    pub fn remove_room(&self, code: &str) -> usize {
        self.rooms
            .remove(&normalize_code(code))
            .map(|(_, conns)| conns.len())
            .unwrap_or(0)
    }

    /// Drop connections idle for longer than `max_idle_ms` or already closed
    pub fn cleanup_stale_connections(&self, max_idle_ms: i64) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let mut removed = 0;

        for room in self.rooms.iter() {
            let before = room.len();
            room.retain(|_, handle| now - handle.last_seen() <= max_idle_ms && handle.is_alive());
            removed += before - room.len();
        }
        self.rooms.retain(|_, conns| !conns.is_empty());

        removed
    }
}

/// Error type for targeted sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    RoomNotFound,
    ConnectionNotFound,
    ConnectionClosed,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::RoomNotFound => write!(f, "room not found"),
            SendError::ConnectionNotFound => write!(f, "connection not found"),
            SendError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for SendError {}
