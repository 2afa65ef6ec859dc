use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId, Role};
use crate::error::RegistryError;

/// Every live connection, keyed by id.
///
/// A table is only reachable through [`Registry::with_table`], so anything
/// that takes `&mut ConnectionTable` runs as a single critical section.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
    next_admission: u64,
}

impl ConnectionTable {
    /// Hands out the next admission sequence number.
    pub fn next_admission(&mut self) -> u64 {
        let seq = self.next_admission;
        self.next_admission += 1;
        seq
    }

    pub fn insert(&mut self, connection: Connection) -> Result<(), RegistryError> {
        match self.connections.entry(connection.id()) {
            Entry::Occupied(entry) => Err(RegistryError::IdCollision(*entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(connection);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Removing an absent id is a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Oldest unpaired connection holding the role opposite to `role`, other than `exclude`.
    pub fn find_pairing_candidate(&self, role: Role, exclude: ConnectionId) -> Option<ConnectionId> {
        self.connections
            .values()
            .filter(|candidate| candidate.id() != exclude && candidate.accepts_partner_role(role))
            .min_by_key(|candidate| candidate.admitted())
            .map(Connection::id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot {
            connections: self.connections.len(),
            ..RegistrySnapshot::default()
        };
        for connection in self.connections.values() {
            match connection.role() {
                Role::Unset => snapshot.unset += 1,
                Role::Sender => snapshot.senders += 1,
                Role::Receiver => snapshot.receivers += 1,
            }
            if connection.partner().is_some() {
                snapshot.paired += 1;
            }
        }
        snapshot.pairs = snapshot.paired / 2;
        snapshot
    }

    /// Panics if any partner link is dangling, one-directional, or same-role.
    #[cfg(test)]
    pub(crate) fn assert_links_consistent(&self) {
        for connection in self.connections.values() {
            let Some(partner_id) = connection.partner() else {
                continue;
            };
            let partner = self
                .get(partner_id)
                .unwrap_or_else(|| panic!("{} links to missing {}", connection.id(), partner_id));
            assert_eq!(
                partner.partner(),
                Some(connection.id()),
                "link between {} and {} is not symmetric",
                connection.id(),
                partner_id
            );
            assert_eq!(
                connection.role().opposite(),
                Some(partner.role()),
                "{} and {} share a role",
                connection.id(),
                partner_id
            );
        }
    }
}

/// Counts exposed on `/debug/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub connections: usize,
    pub unset: usize,
    pub senders: usize,
    pub receivers: usize,
    /// Connections currently holding a partner link.
    pub paired: usize,
    pub pairs: usize,
}

/// Shared handle to the connection table. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<ConnectionTable>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access to the table. `f` must not block.
    pub fn with_table<R>(&self, f: impl FnOnce(&mut ConnectionTable) -> R) -> R {
        let mut table = self.inner.lock();
        f(&mut table)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.lock().snapshot()
    }
}

#[cfg(test)]
impl Registry {
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.lock().get(id).is_some()
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.inner.lock().get(id).map(Connection::role)
    }

    pub fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.inner.lock().get(id).and_then(Connection::partner)
    }
}
