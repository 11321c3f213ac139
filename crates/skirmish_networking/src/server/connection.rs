//! # Client Connection Management
//!
//! Track connected clients, the entity each one controls, and the action
//! packages received since the last tick.

use std::fmt;

use skirmish_core::{EntityId, PlayerAction};

/// Unique identifier for a client connection, assigned by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Invalid/null connection ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns true if this is a null/invalid ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A connected client.
#[derive(Clone, Debug)]
pub struct ClientConnection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Entity controlled by this client.
    pub entity_id: EntityId,
    /// Server time the client joined at.
    pub connected_at: f64,
    /// Action packages waiting for the next tick, in arrival order.
    pending_packages: Vec<Vec<PlayerAction>>,
    /// Packets received.
    pub packets_received: u64,
    /// Packets that failed to decode.
    pub malformed_packets: u64,
    /// Action entries dropped while decoding.
    pub dropped_entries: u64,
}

impl ClientConnection {
    /// Creates a connection controlling `entity_id`.
    #[must_use]
    pub fn new(id: ConnectionId, entity_id: EntityId, connected_at: f64) -> Self {
        Self {
            id,
            entity_id,
            connected_at,
            pending_packages: Vec::new(),
            packets_received: 0,
            malformed_packets: 0,
            dropped_entries: 0,
        }
    }

    /// Queues a decoded action package.
    pub fn push_package(&mut self, actions: Vec<PlayerAction>) {
        self.pending_packages.push(actions);
    }

    /// Number of packages waiting.
    #[inline]
    #[must_use]
    pub fn pending_package_count(&self) -> usize {
        self.pending_packages.len()
    }

    /// Drains the waiting packages.
    pub fn take_packages(&mut self) -> Vec<Vec<PlayerAction>> {
        std::mem::take(&mut self.pending_packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{PlayerActionType, Vec2};

    #[test]
    fn test_null_id() {
        assert!(ConnectionId::default().is_null());
        assert!(!ConnectionId(3).is_null());
    }

    #[test]
    fn test_package_queue() {
        let mut conn = ClientConnection::new(ConnectionId(1), EntityId::new(1), 0.0);
        let action = PlayerAction::new(1, PlayerActionType::Idle, 0.0, Vec2::ZERO);

        conn.push_package(vec![action]);
        conn.push_package(Vec::new());
        assert_eq!(conn.pending_package_count(), 2);

        let packages = conn.take_packages();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0], vec![action]);
        assert_eq!(conn.pending_package_count(), 0);
    }
}
