//! Client identity shared by all connections of one account

use bytes::Bytes;
use chat_core::{Account, ChatSession, ChatSessionId, ClientId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use super::Connection;

/// In-memory view of an authenticated client.
///
/// Loaded from storage on the first attach and kept in step with every
/// successful mutation while at least one device is connected.
pub struct ClientIdentity {
    client_id: ClientId,
    email: String,
    username: RwLock<String>,
    /// Clients with a pending request to this one
    chat_requests: RwLock<BTreeSet<ClientId>>,
    /// Sessions this client belongs to, with their members
    chat_sessions: RwLock<BTreeMap<ChatSessionId, Vec<ClientId>>>,
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl ClientIdentity {
    pub fn new(account: Account, chat_sessions: Vec<ChatSession>, chat_requests: Vec<ClientId>) -> Self {
        Self {
            client_id: account.client_id,
            email: account.email,
            username: RwLock::new(account.username),
            chat_requests: RwLock::new(chat_requests.into_iter().collect()),
            chat_sessions: RwLock::new(
                chat_sessions
                    .into_iter()
                    .map(|session| (session.id, session.members))
                    .collect(),
            ),
            connections: RwLock::new(Vec::new()),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> String {
        self.username.read().clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        *self.username.write() = username.into();
    }

    // === Chat requests ===

    pub fn chat_requests(&self) -> Vec<ClientId> {
        self.chat_requests.read().iter().copied().collect()
    }

    pub fn add_chat_request(&self, sender: ClientId) -> bool {
        self.chat_requests.write().insert(sender)
    }

    pub fn remove_chat_request(&self, sender: ClientId) -> bool {
        self.chat_requests.write().remove(&sender)
    }

    // === Chat sessions ===

    pub fn chat_sessions(&self) -> Vec<ChatSession> {
        self.chat_sessions
            .read()
            .iter()
            .map(|(id, members)| ChatSession::new(*id, members.clone()))
            .collect()
    }

    pub fn chat_session_ids(&self) -> Vec<ChatSessionId> {
        self.chat_sessions.read().keys().copied().collect()
    }

    pub fn has_chat_session(&self, session_id: ChatSessionId) -> bool {
        self.chat_sessions.read().contains_key(&session_id)
    }

    pub fn add_chat_session(&self, session: &ChatSession) {
        self.chat_sessions
            .write()
            .insert(session.id, session.members.clone());
    }

    pub fn remove_chat_session(&self, session_id: ChatSessionId) -> bool {
        self.chat_sessions.write().remove(&session_id).is_some()
    }

    // === Connections ===

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn add_connection(&self, connection: Arc<Connection>) {
        let mut connections = self.connections.write();
        if !connections.iter().any(|c| c.id() == connection.id()) {
            connections.push(connection);
        }
    }

    pub fn remove_connection(&self, connection_id: Uuid) -> bool {
        let mut connections = self.connections.write();
        let before = connections.len();
        connections.retain(|c| c.id() != connection_id);
        connections.len() != before
    }

    /// Queue the same payload on every device of this client
    pub fn send_all(&self, payload: &Bytes) -> usize {
        self.connections
            .read()
            .iter()
            .filter(|c| c.send(payload.clone()))
            .count()
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("chat_sessions", &self.chat_sessions.read().len())
            .field("chat_requests", &self.chat_requests.read().len())
            .field("connections", &self.connection_count())
            .finish()
    }
}
