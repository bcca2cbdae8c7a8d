//! Chat-session registry
//!
//! Maps each chat session with at least one active connection to those
//! connections. Activation and eviction both run under the session's map
//! shard lock, so an eviction never drops a connection added concurrently.

use bytes::Bytes;
use chat_core::{ChatSessionId, ClientId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::connection::Connection;
use crate::protocol::ServerMessage;

#[derive(Default)]
struct ActiveSession {
    connections: Vec<Arc<Connection>>,
}

impl ActiveSession {
    fn active_clients(&self) -> Vec<ClientId> {
        let mut clients: Vec<ClientId> = self
            .connections
            .iter()
            .filter_map(|c| c.client_id())
            .collect();
        clients.sort_unstable();
        clients.dedup();
        clients
    }
}

/// Active connections per chat session
pub struct SessionRegistry {
    sessions: DashMap<ChatSessionId, ActiveSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a connection to a session's active list.
    ///
    /// The session is recorded on the connection so [`release`](Self::release)
    /// can undo it. Idempotent; returns false if the connection was already
    /// active or has been released.
    pub fn activate(&self, session_id: ChatSessionId, connection: &Arc<Connection>) -> bool {
        connection
            .with_chat_sessions(|tracked| {
                let mut session = self.sessions.entry(session_id).or_default();
                tracked.insert(session_id);
                if session.connections.iter().any(|c| c.id() == connection.id()) {
                    return false;
                }
                session.connections.push(Arc::clone(connection));
                debug!(session_id = %session_id, conn_id = %connection.id(), "Connection activated");
                true
            })
            .unwrap_or(false)
    }

    /// Deactivate a connection in every session it was activated in and stop
    /// further activations.
    ///
    /// Returns the sessions that still have other active connections.
    pub fn release(&self, connection: &Connection) -> Vec<ChatSessionId> {
        connection
            .take_chat_sessions()
            .into_iter()
            .filter(|session_id| {
                self.sessions.contains_key(session_id) && !self.deactivate(*session_id, connection.id())
            })
            .collect()
    }

    /// Remove a connection from a session, evicting the session once nobody is left.
    ///
    /// Returns true if the session was evicted.
    pub fn deactivate(&self, session_id: ChatSessionId, connection_id: Uuid) -> bool {
        let evicted = self
            .sessions
            .remove_if_mut(&session_id, |_, session| {
                session.connections.retain(|c| c.id() != connection_id);
                session.connections.is_empty()
            })
            .is_some();
        if evicted {
            debug!(session_id = %session_id, "Chat session evicted");
        }
        evicted
    }

    /// Drop a session regardless of who is active in it
    pub fn evict(&self, session_id: ChatSessionId) -> Vec<Arc<Connection>> {
        let connections = self
            .sessions
            .remove(&session_id)
            .map(|(_, session)| session.connections)
            .unwrap_or_default();
        for connection in &connections {
            connection.with_chat_sessions(|tracked| tracked.remove(&session_id));
        }
        connections
    }

    /// Queue one prepared payload on every active connection of a session.
    ///
    /// Every recipient gets a clone of the same buffer. Returns the number of
    /// connections the payload was queued on.
    pub fn broadcast(&self, session_id: ChatSessionId, payload: &Bytes, except: Option<Uuid>) -> usize {
        let Some(session) = self.sessions.get(&session_id) else {
            return 0;
        };
        session
            .connections
            .iter()
            .filter(|c| Some(c.id()) != except && c.is_authenticated())
            .filter(|c| c.send(payload.clone()))
            .count()
    }

    /// Tell every active connection of a session who is currently active in it
    pub fn announce_active_members(&self, session_id: ChatSessionId) -> usize {
        let Some(session) = self.sessions.get(&session_id) else {
            return 0;
        };
        // A member list stays far below the compression threshold
        let payload = ServerMessage::ActiveMembers {
            session_id,
            clients: session.active_clients(),
        }
        .encode()
        .freeze();
        session
            .connections
            .iter()
            .filter(|c| c.is_authenticated())
            .filter(|c| c.send(payload.clone()))
            .count()
    }

    pub fn active_clients(&self, session_id: ChatSessionId) -> Vec<ClientId> {
        self.sessions
            .get(&session_id)
            .map(|s| s.active_clients())
            .unwrap_or_default()
    }

    pub fn is_active(&self, session_id: ChatSessionId, connection_id: Uuid) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|s| s.connections.iter().any(|c| c.id() == connection_id))
    }

    /// Number of sessions with at least one active connection
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active_sessions", &self.sessions.len())
            .finish()
    }
}
