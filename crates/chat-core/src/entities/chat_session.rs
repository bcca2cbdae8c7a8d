//! Chat session entity - a conversation with persisted membership

use crate::value_objects::{ChatSessionId, ClientId};

/// Persisted chat session with its ordered member list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: ChatSessionId,
    pub members: Vec<ClientId>,
}

impl ChatSession {
    pub fn new(id: ChatSessionId, members: Vec<ClientId>) -> Self {
        Self { id, members }
    }

    /// Check whether a client belongs to this session
    #[inline]
    pub fn has_member(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    /// Members other than `client_id`
    pub fn others(&self, client_id: ClientId) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied().filter(move |m| *m != client_id)
    }
}
