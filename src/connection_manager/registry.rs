use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RegistryError;
use crate::identity::UserIdentity;

use super::{ConnectionHandle, ConnectionStats};

struct RegisteredConnection {
    /// Registration order, used to keep snapshots stable
    join_seq: u64,
    handle: Arc<ConnectionHandle>,
}

/// Tracks every connection that can currently receive a push
pub struct ConnectionRegistry {
    /// connection_id -> registered connection
    connections: DashMap<Uuid, RegisteredConnection>,
    next_seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a connection.
    ///
    /// Registering the same connection twice is a programming error: debug
    /// builds panic, release builds leave the existing entry untouched.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Result<(), RegistryError> {
        let conn_id = handle.id;

        match self.connections.entry(conn_id) {
            Entry::Occupied(_) => {
                tracing::error!(connection_id = %conn_id, "Connection registered twice");
                if cfg!(debug_assertions) {
                    panic!("connection {} registered twice", conn_id);
                }
                Err(RegistryError::AlreadyRegistered(conn_id))
            }
            Entry::Vacant(slot) => {
                let join_seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    connection_id = %conn_id,
                    user_id = %handle.identity.id,
                    "Connection registered"
                );
                slot.insert(RegisteredConnection { join_seq, handle });
                Ok(())
            }
        }
    }

    /// Remove a connection, returning it if this call removed it.
    ///
    /// Safe to call from several teardown paths; only one of them gets `Some`.
    pub fn deregister(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        let (_, entry) = self.connections.remove(&connection_id)?;
        tracing::info!(
            connection_id = %connection_id,
            user_id = %entry.handle.identity.id,
            "Connection unregistered"
        );
        Some(entry.handle)
    }

    /// Identities of all current members, in join order
    pub fn snapshot(&self) -> Vec<UserIdentity> {
        self.ordered()
            .into_iter()
            .map(|handle| handle.identity.clone())
            .collect()
    }

    /// Visit every registered connection in join order.
    ///
    /// The visitor runs without any registry lock held, so it may register or
    /// deregister connections itself.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<ConnectionHandle>),
    {
        for handle in self.ordered() {
            visit(&handle);
        }
    }

    /// Get connection by ID
    pub fn get(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        let users: HashSet<_> = self
            .connections
            .iter()
            .map(|entry| entry.handle.identity.id.clone())
            .collect();

        ConnectionStats {
            total_connections: self.connections.len(),
            unique_users: users.len(),
        }
    }

    fn ordered(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut entries: Vec<(u64, Arc<ConnectionHandle>)> = self
            .connections
            .iter()
            .map(|entry| (entry.join_seq, entry.handle.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, handle)| handle).collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
