//! Individual TLS connection
//!
//! The connection task owns the transport. Everything else reaches the peer
//! through this handle's outbound queue.

use bytes::Bytes;
use chat_core::{ChatSessionId, ClientId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{prepare_payload, ServerMessage};

/// Work handed to the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized payload to frame and write
    Frame(Bytes),
    /// Leave the authenticated stage and return to Start
    Reset,
}

/// A single connection
pub struct Connection {
    /// Unique connection ID
    id: Uuid,

    /// Remote address
    addr: SocketAddr,

    /// Authenticated client (None until the connection is attached to an identity)
    client_id: RwLock<Option<ClientId>>,

    /// Chat sessions this connection was activated in.
    /// `None` once the authenticated stage has been closed.
    chat_sessions: Mutex<Option<HashSet<ChatSessionId>>>,

    /// Queue drained by the connection task
    sender: mpsc::UnboundedSender<Outbound>,

    /// Payloads at or above this size are compressed
    compression_threshold: usize,

    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outbound>,
        compression_threshold: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            addr,
            client_id: RwLock::new(None),
            chat_sessions: Mutex::new(Some(HashSet::new())),
            sender,
            compression_threshold,
            created_at: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Remote IP, the key for device verification
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        *self.client_id.read()
    }

    pub fn set_client_id(&self, client_id: Option<ClientId>) {
        *self.client_id.write() = client_id;
    }

    pub fn is_authenticated(&self) -> bool {
        self.client_id.read().is_some()
    }

    /// Accept session activations again after a previous close
    pub fn open_chat_sessions(&self) {
        self.chat_sessions.lock().get_or_insert_with(HashSet::new);
    }

    /// Run `f` on the tracked session set, or return None if activations are closed.
    ///
    /// The lock is held for the whole call, so a concurrent
    /// [`take_chat_sessions`](Self::take_chat_sessions) sees either none or all of `f`.
    pub fn with_chat_sessions<R>(&self, f: impl FnOnce(&mut HashSet<ChatSessionId>) -> R) -> Option<R> {
        self.chat_sessions.lock().as_mut().map(f)
    }

    /// Close activations and return every session this connection was activated in
    pub fn take_chat_sessions(&self) -> Vec<ChatSessionId> {
        let mut sessions: Vec<ChatSessionId> = self
            .chat_sessions
            .lock()
            .take()
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        sessions.sort_unstable();
        sessions
    }

    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    /// Queue an already prepared payload.
    ///
    /// Returns false once the connection task has gone away.
    pub fn send(&self, payload: Bytes) -> bool {
        self.sender.send(Outbound::Frame(payload)).is_ok()
    }

    /// Serialize, prepare and queue a message
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        self.send(prepare_payload(message.encode(), self.compression_threshold))
    }

    /// Ask the connection task to return to the Start stage
    pub fn reset(&self) -> bool {
        self.sender.send(Outbound::Reset).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("client_id", &self.client_id())
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ZSTD_MAGIC;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_connection_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 1024);

        assert_eq!(conn.ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert!(conn.client_id().is_none());
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn test_connection_authentication() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 1024);

        conn.set_client_id(Some(ClientId::new(7)));
        assert!(conn.is_authenticated());
        assert_eq!(conn.client_id(), Some(ClientId::new(7)));

        conn.set_client_id(None);
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn test_chat_session_tracking() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 1024);

        assert_eq!(conn.with_chat_sessions(|s| s.insert(ChatSessionId::new(4))), Some(true));
        conn.with_chat_sessions(|s| s.insert(ChatSessionId::new(2)));
        assert_eq!(conn.take_chat_sessions(), vec![ChatSessionId::new(2), ChatSessionId::new(4)]);

        // Closed until reopened
        assert_eq!(conn.with_chat_sessions(|s| s.insert(ChatSessionId::new(9))), None);
        assert!(conn.take_chat_sessions().is_empty());
        conn.open_chat_sessions();
        assert_eq!(conn.with_chat_sessions(|s| s.len()), Some(0));
    }

    #[test]
    fn test_send_message_and_reset() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 1024);

        assert!(conn.send_message(&ServerMessage::IpVerified(true)));
        assert!(conn.reset());

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Frame(Bytes::from_static(&[0, 0, 0, 1, 1]))
        );
        assert_eq!(rx.try_recv().unwrap(), Outbound::Reset);
    }

    #[test]
    fn test_large_message_compressed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 64);

        conn.send_message(&ServerMessage::info("x".repeat(4096)));
        let Outbound::Frame(payload) = rx.try_recv().unwrap() else {
            panic!("expected a frame");
        };
        assert!(payload.starts_with(&ZSTD_MAGIC));
    }

    #[test]
    fn test_closed_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(addr(), tx, 1024);
        drop(rx);

        assert!(conn.is_closed());
        assert!(!conn.send(Bytes::from_static(b"x")));
    }
}
