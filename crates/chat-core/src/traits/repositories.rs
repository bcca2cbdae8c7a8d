//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation. Every method is a suspension point; callers
//! only update in-memory state after the call returned `Ok`.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::entities::{Account, ChatSession, Credentials, Device, Message, NewAccount};
use crate::error::DomainError;
use crate::value_objects::{ChatSessionId, ClientId, MessageId};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Account Repository
// ============================================================================

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find account profile by client ID
    async fn find_by_id(&self, client_id: ClientId) -> RepoResult<Option<Account>>;

    /// Find the client owning an email address
    async fn find_client_id(&self, email: &str) -> RepoResult<Option<ClientId>>;

    /// Check if email is already taken
    async fn email_exists(&self, email: &str) -> RepoResult<bool>;

    /// Get the stored password hash for an email address
    async fn credentials(&self, email: &str) -> RepoResult<Option<Credentials>>;

    /// Persist a new account together with its backup codes
    async fn create_account(&self, account: &NewAccount) -> RepoResult<()>;

    async fn change_username(&self, client_id: ClientId, username: &str) -> RepoResult<()>;

    async fn change_password(&self, client_id: ClientId, password_hash: &str) -> RepoResult<()>;

    /// Hashes of the unused backup verification codes
    async fn backup_code_hashes(&self, client_id: ClientId) -> RepoResult<Vec<String>>;

    /// Remove one used backup code; returns whether it was present
    async fn remove_backup_code(&self, client_id: ClientId, code_hash: &str) -> RepoResult<bool>;

    /// Replace every backup code of the client
    async fn replace_backup_codes(&self, client_id: ClientId, code_hashes: &[String])
        -> RepoResult<()>;

    async fn set_icon(&self, client_id: ClientId, icon: &[u8]) -> RepoResult<()>;

    async fn icon(&self, client_id: ClientId) -> RepoResult<Option<Vec<u8>>>;

    /// Every client ID currently assigned to an account
    async fn client_ids_in_use(&self) -> RepoResult<Vec<ClientId>>;
}

// ============================================================================
// Device Repository
// ============================================================================

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Whether any client has a logged-in device at this address
    async fn is_ip_verified(&self, ip: IpAddr) -> RepoResult<bool>;

    /// Whether this client has a logged-in device at this address
    async fn is_device_verified(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool>;

    /// Record a login; replaces the description of an existing row
    async fn register_device(&self, device: &Device) -> RepoResult<()>;

    async fn devices_of(&self, client_id: ClientId) -> RepoResult<Vec<Device>>;

    /// Remove one device; returns whether it existed
    async fn logout(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool>;

    /// Remove every device of the client; returns how many were removed
    async fn logout_all_devices(&self, client_id: ClientId) -> RepoResult<u64>;
}

// ============================================================================
// Chat Session Repository
// ============================================================================

#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    /// Every chat session the client belongs to, with members
    async fn chat_sessions_of(&self, client_id: ClientId) -> RepoResult<Vec<ChatSession>>;

    /// Ordered member list of a session
    async fn members_of(&self, session_id: ChatSessionId) -> RepoResult<Vec<ClientId>>;

    /// Existing session shared by exactly these two clients
    async fn chat_session_between(&self, a: ClientId, b: ClientId)
        -> RepoResult<Option<ChatSessionId>>;

    /// Senders of the requests waiting on `receiver`
    async fn chat_requests_of(&self, receiver: ClientId) -> RepoResult<Vec<ClientId>>;

    /// Persist a pending request
    async fn send_chat_request(&self, sender: ClientId, receiver: ClientId) -> RepoResult<()>;

    /// Create the session and drop the request in one step
    async fn accept_chat_request(
        &self,
        receiver: ClientId,
        sender: ClientId,
        session_id: ChatSessionId,
    ) -> RepoResult<ChatSession>;

    /// Drop a pending request; returns whether it existed
    async fn decline_chat_request(&self, receiver: ClientId, sender: ClientId) -> RepoResult<bool>;

    /// Delete the session, its membership, and its messages
    async fn delete_chat_session(&self, session_id: ChatSessionId) -> RepoResult<()>;

    /// Every chat-session ID currently in storage
    async fn chat_session_ids_in_use(&self) -> RepoResult<Vec<ChatSessionId>>;
}

// ============================================================================
// Message Repository
// ============================================================================

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn add_message(&self, message: &Message) -> RepoResult<()>;

    /// Page backwards from the newest message.
    ///
    /// Skips the `offset` newest messages and returns up to `count` older
    /// ones in ascending ID order.
    async fn select_messages(
        &self,
        session_id: ChatSessionId,
        offset: u32,
        count: u32,
    ) -> RepoResult<Vec<Message>>;

    async fn find_message(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<Message>>;

    /// Returns whether the message existed
    async fn delete_message(&self, session_id: ChatSessionId, message_id: MessageId)
        -> RepoResult<bool>;

    /// File name and bytes of a file message
    async fn file(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<(String, Vec<u8>)>>;

    /// Highest message ID ever persisted for the session
    async fn max_message_id(&self, session_id: ChatSessionId) -> RepoResult<Option<MessageId>>;
}
