//! Viewer fan-out
//!
//! Owns the set of live WebSocket connections for one room. Each entry is
//! the sending half of a bounded channel whose receiving half lives in that
//! connection's socket task. Broadcast serializes the event once and shares
//! the frame; a full or closed channel counts as a delivery failure and the
//! connection is dropped from the pool on the spot, without touching the
//! other viewers.

use crate::room::messages::ServerMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Connection pool for one room
pub struct ConnectionPool {
    connections: HashMap<Uuid, mpsc::Sender<Arc<String>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Register a connection's outbound channel
    pub fn track(&mut self, id: Uuid, sender: mpsc::Sender<Arc<String>>) {
        self.connections.insert(id, sender);
    }

    /// Remove a connection; returns whether it was present
    pub fn untrack(&mut self, id: &Uuid) -> bool {
        self.connections.remove(id).is_some()
    }

    /// Number of live connections
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Send an event to every connection, returning how many took it.
    /// Connections that fail are removed before this returns.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        if self.connections.is_empty() {
            return 0;
        }

        let frame = match serde_json::to_string(message) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize room event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, sender) in &self.connections {
            if sender.try_send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                // Full buffer and closed channel are the same thing here:
                // this viewer is not keeping up
                failed.push(*id);
            }
        }

        for id in failed {
            self.connections.remove(&id);
            tracing::debug!(connection = %id, "Dropped viewer, delivery failed");
        }

        delivered
    }

    /// Send an event to one connection; failure removes it
    pub fn send(&mut self, id: &Uuid, message: &ServerMessage) -> bool {
        let Some(sender) = self.connections.get(id) else {
            return false;
        };

        let frame = match serde_json::to_string(message) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize room event");
                return false;
            }
        };

        if sender.try_send(frame).is_ok() {
            true
        } else {
            self.connections.remove(id);
            tracing::debug!(connection = %id, "Dropped viewer, delivery failed");
            false
        }
    }

    /// Drop every connection. Each socket task sees its channel close and
    /// finishes with a normal close frame.
    pub fn close_all(&mut self) {
        let count = self.connections.len();
        self.connections.clear();
        if count > 0 {
            tracing::debug!(connections = count, "Closed all viewer connections");
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
