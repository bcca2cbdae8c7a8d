//! Connection manager
//!
//! Tracks every open connection and the shared identity of every connected
//! client, using DashMap for thread-safe access.

use chat_core::ClientId;
use chat_service::{AccountService, ChatService, ServiceContext, ServiceResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{ClientIdentity, Connection};

/// Manages all open connections and client identities
pub struct ConnectionManager {
    /// Open connections by connection ID
    connections: DashMap<Uuid, Arc<Connection>>,

    /// Identities of clients with at least one authenticated connection
    identities: DashMap<ClientId, Arc<ClientIdentity>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            identities: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a freshly accepted connection
    pub fn add_connection(&self, connection: Arc<Connection>) {
        debug!(conn_id = %connection.id(), addr = %connection.addr(), "Connection added");
        self.connections.insert(connection.id(), connection);
    }

    /// Forget a closed connection
    pub fn remove_connection(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(&connection_id).map(|(_, c)| c);
        if removed.is_some() {
            debug!(conn_id = %connection_id, "Connection removed");
        }
        removed
    }

    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        self.connections.get(&connection_id).map(|c| Arc::clone(&c))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Identity of a connected client
    pub fn identity(&self, client_id: ClientId) -> Option<Arc<ClientIdentity>> {
        self.identities.get(&client_id).map(|i| Arc::clone(&i))
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Attach an authenticated connection to its client's identity.
    ///
    /// The first device of a client loads the identity from storage. Storage
    /// is read outside the map lock; the connection itself is added while the
    /// entry is held so a concurrent detach cannot drop the identity under it.
    pub async fn attach(
        &self,
        connection: &Arc<Connection>,
        client_id: ClientId,
        services: &ServiceContext,
    ) -> ServiceResult<Arc<ClientIdentity>> {
        if let Some(identity) = self.identities.get(&client_id) {
            identity.add_connection(Arc::clone(connection));
            connection.set_client_id(Some(client_id));
            return Ok(Arc::clone(&identity));
        }

        let account = AccountService::new(services).account(client_id).await?;
        let chat = ChatService::new(services);
        let sessions = chat.chat_sessions_of(client_id).await?;
        let requests = chat.chat_requests_of(client_id).await?;
        let loaded = ClientIdentity::new(account, sessions, requests);

        let identity = match self.identities.entry(client_id) {
            // Another device won the race; its copy is just as fresh
            Entry::Occupied(entry) => {
                entry.get().add_connection(Arc::clone(connection));
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                let inserted = entry.insert(Arc::new(loaded));
                inserted.add_connection(Arc::clone(connection));
                Arc::clone(inserted.value())
            }
        };
        connection.set_client_id(Some(client_id));

        debug!(conn_id = %connection.id(), client_id = %client_id, "Connection attached");
        Ok(identity)
    }

    /// Detach a connection from its identity, dropping the identity with its last device.
    ///
    /// Returns the identity the connection was attached to.
    pub fn detach(&self, connection: &Connection) -> Option<Arc<ClientIdentity>> {
        let client_id = connection.client_id()?;
        let mut attached = None;

        self.identities.remove_if(&client_id, |_, identity| {
            identity.remove_connection(connection.id());
            attached = Some(Arc::clone(identity));
            identity.connection_count() == 0
        });
        connection.set_client_id(None);

        debug!(conn_id = %connection.id(), client_id = %client_id, "Connection detached");
        attached
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("identities", &self.identities.len())
            .finish()
    }
}
