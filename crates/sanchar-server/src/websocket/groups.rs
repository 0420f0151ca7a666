//! Group membership registry and fan-out.
//!
//! Connections join typed groups: a session group per interaction and a
//! user group per account. The two namespaces are separate enum variants,
//! so a session ID can never collide with a user ID.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sanchar_core::ConnectionId;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::protocol::OutboundEvent;

/// Broadcast group key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Everyone viewing one interaction's chat.
    Session(String),
    /// Every connection signed in as one user.
    User(String),
}

impl GroupKey {
    /// Session group for an interaction.
    pub fn session(id: impl Into<String>) -> Self {
        Self::Session(id.into())
    }

    /// User group for an account.
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    members: HashMap<GroupKey, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<GroupKey>>,
}

/// Tracks live connections and their group memberships.
///
/// All operations are synchronous and short; the lock is never held
/// across an `.await`.
#[derive(Default)]
pub struct GroupRegistry {
    inner: RwLock<Inner>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection (member of no group yet).
    pub fn register(&self, connection: Arc<ClientConnection>) {
        let mut inner = self.inner.write();
        let _ = inner.connections.insert(connection.id.clone(), connection);
    }

    /// Remove a connection and all its memberships. Returns the groups it left.
    pub fn unregister(&self, conn_id: &ConnectionId) -> Vec<GroupKey> {
        let mut inner = self.inner.write();
        let _ = inner.connections.remove(conn_id);
        Self::leave_all_locked(&mut inner, conn_id)
    }

    /// Add a connection to a group. Returns `false` if it was already a member.
    pub fn join(&self, conn_id: &ConnectionId, key: GroupKey) -> bool {
        let mut inner = self.inner.write();
        if !inner.connections.contains_key(conn_id) {
            warn!(conn_id = %conn_id, group = %key, "join from unregistered connection ignored");
            return false;
        }
        let added = inner
            .memberships
            .entry(conn_id.clone())
            .or_default()
            .insert(key.clone());
        if added {
            let _ = inner.members.entry(key).or_default().insert(conn_id.clone());
        }
        added
    }

    /// Remove a connection from one group. Returns whether it was a member.
    pub fn leave(&self, conn_id: &ConnectionId, key: &GroupKey) -> bool {
        let mut inner = self.inner.write();
        let removed = inner
            .memberships
            .get_mut(conn_id)
            .is_some_and(|groups| groups.remove(key));
        if removed {
            Self::drop_member(&mut inner, key, conn_id);
        }
        removed
    }

    fn leave_all_locked(inner: &mut Inner, conn_id: &ConnectionId) -> Vec<GroupKey> {
        let groups: Vec<GroupKey> = inner
            .memberships
            .remove(conn_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for key in &groups {
            Self::drop_member(inner, key, conn_id);
        }
        groups
    }

    fn drop_member(inner: &mut Inner, key: &GroupKey, conn_id: &ConnectionId) {
        if let Some(set) = inner.members.get_mut(key) {
            let _ = set.remove(conn_id);
            if set.is_empty() {
                let _ = inner.members.remove(key);
            }
        }
    }

    /// Send an event to every current member of `key`. Returns how many
    /// connections accepted the frame.
    pub fn broadcast(&self, key: &GroupKey, event: &OutboundEvent) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event.event_type, error = %e, "failed to serialize event");
                return 0;
            }
        };
        let inner = self.inner.read();
        let Some(members) = inner.members.get(key) else {
            debug!(event = event.event_type, group = %key, "broadcast to empty group");
            return 0;
        };
        let mut delivered = 0;
        for conn in members.iter().filter_map(|id| inner.connections.get(id)) {
            if conn.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                warn!(conn_id = %conn.id, group = %key, "failed to enqueue event");
            }
        }
        debug!(event = event.event_type, group = %key, delivered, "broadcast");
        delivered
    }

    /// Send an event to one connection. Returns `false` if it is gone.
    pub fn send_to(&self, conn_id: &ConnectionId, event: &OutboundEvent) -> bool {
        let conn = self.inner.read().connections.get(conn_id).cloned();
        conn.is_some_and(|c| c.send_event(event))
    }

    /// Whether a connection ID is live.
    pub fn is_connected(&self, conn_id: &ConnectionId) -> bool {
        self.inner.read().connections.contains_key(conn_id)
    }

    /// Whether any connection is in `key`.
    pub fn has_members(&self, key: &GroupKey) -> bool {
        self.inner.read().members.contains_key(key)
    }

    /// Number of connections in `key`.
    pub fn member_count(&self, key: &GroupKey) -> usize {
        self.inner.read().members.get(key).map_or(0, HashSet::len)
    }

    /// Groups a connection currently belongs to.
    pub fn groups_of(&self, conn_id: &ConnectionId) -> Vec<GroupKey> {
        self.inner
            .read()
            .memberships
            .get(conn_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Live connections.
    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }
}
