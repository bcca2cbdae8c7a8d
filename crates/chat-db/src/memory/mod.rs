//! In-memory implementation of every repository trait
//!
//! Used by the test suites and by `STORAGE=memory` development runs. All
//! state sits behind one `parking_lot::Mutex`; no lock is held across an
//! await point.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_core::entities::{Account, ChatSession, Credentials, Device, Message, NewAccount};
use chat_core::error::DomainError;
use chat_core::traits::{
    AccountRepository, ChatSessionRepository, DeviceRepository, MessageRepository, RepoResult,
};
use chat_core::value_objects::{ChatSessionId, ClientId, MessageId};

struct StoredAccount {
    account: Account,
    password_hash: String,
    backup_code_hashes: Vec<String>,
    icon: Option<Vec<u8>>,
}

struct StoredSession {
    members: Vec<ClientId>,
    last_message_id: i32,
    messages: BTreeMap<MessageId, Message>,
}

#[derive(Default)]
struct MemoryStoreInner {
    accounts: HashMap<ClientId, StoredAccount>,
    emails: HashMap<String, ClientId>,
    devices: Vec<Device>,
    /// (sender, receiver) in arrival order
    chat_requests: Vec<(ClientId, ClientId)>,
    sessions: HashMap<ChatSessionId, StoredSession>,
}

/// Process-local store implementing all repository traits.
///
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of persisted chat sessions
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Number of persisted messages in a session
    pub fn message_count(&self, session_id: ChatSessionId) -> usize {
        self.inner
            .lock()
            .sessions
            .get(&session_id)
            .map_or(0, |s| s.messages.len())
    }

    fn check(&self) -> RepoResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError(
                "memory store is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_by_id(&self, client_id: ClientId) -> RepoResult<Option<Account>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .accounts
            .get(&client_id)
            .map(|stored| stored.account.clone()))
    }

    async fn find_client_id(&self, email: &str) -> RepoResult<Option<ClientId>> {
        self.check()?;
        Ok(self.inner.lock().emails.get(email).copied())
    }

    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        self.check()?;
        Ok(self.inner.lock().emails.contains_key(email))
    }

    async fn credentials(&self, email: &str) -> RepoResult<Option<Credentials>> {
        self.check()?;
        let inner = self.inner.lock();
        Ok(inner.emails.get(email).and_then(|id| {
            inner.accounts.get(id).map(|stored| Credentials {
                client_id: *id,
                password_hash: stored.password_hash.clone(),
            })
        }))
    }

    async fn create_account(&self, account: &NewAccount) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        if inner.emails.contains_key(&account.email) {
            return Err(DomainError::EmailAlreadyExists);
        }
        if inner.accounts.contains_key(&account.client_id) {
            return Err(DomainError::InternalError(format!(
                "Client ID {} already assigned",
                account.client_id
            )));
        }

        let (profile, password_hash, backup_code_hashes) = account.clone().into_account();
        inner.emails.insert(profile.email.clone(), profile.client_id);
        inner.accounts.insert(
            profile.client_id,
            StoredAccount {
                account: profile,
                password_hash,
                backup_code_hashes,
                icon: None,
            },
        );
        Ok(())
    }

    async fn change_username(&self, client_id: ClientId, username: &str) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let stored = inner
            .accounts
            .get_mut(&client_id)
            .ok_or(DomainError::ClientNotFound(client_id))?;
        stored.account.username = username.to_string();
        Ok(())
    }

    async fn change_password(&self, client_id: ClientId, password_hash: &str) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let stored = inner
            .accounts
            .get_mut(&client_id)
            .ok_or(DomainError::ClientNotFound(client_id))?;
        stored.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn backup_code_hashes(&self, client_id: ClientId) -> RepoResult<Vec<String>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .accounts
            .get(&client_id)
            .map(|stored| stored.backup_code_hashes.clone())
            .unwrap_or_default())
    }

    async fn remove_backup_code(&self, client_id: ClientId, code_hash: &str) -> RepoResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock();
        let Some(stored) = inner.accounts.get_mut(&client_id) else {
            return Ok(false);
        };
        let before = stored.backup_code_hashes.len();
        stored.backup_code_hashes.retain(|h| h != code_hash);
        Ok(stored.backup_code_hashes.len() < before)
    }

    async fn replace_backup_codes(
        &self,
        client_id: ClientId,
        code_hashes: &[String],
    ) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let stored = inner
            .accounts
            .get_mut(&client_id)
            .ok_or(DomainError::ClientNotFound(client_id))?;
        stored.backup_code_hashes = code_hashes.to_vec();
        Ok(())
    }

    async fn set_icon(&self, client_id: ClientId, icon: &[u8]) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let stored = inner
            .accounts
            .get_mut(&client_id)
            .ok_or(DomainError::ClientNotFound(client_id))?;
        stored.icon = Some(icon.to_vec());
        Ok(())
    }

    async fn icon(&self, client_id: ClientId) -> RepoResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .accounts
            .get(&client_id)
            .and_then(|stored| stored.icon.clone()))
    }

    async fn client_ids_in_use(&self) -> RepoResult<Vec<ClientId>> {
        self.check()?;
        Ok(self.inner.lock().accounts.keys().copied().collect())
    }
}

#[async_trait]
impl DeviceRepository for MemoryStore {
    async fn is_ip_verified(&self, ip: IpAddr) -> RepoResult<bool> {
        self.check()?;
        Ok(self.inner.lock().devices.iter().any(|d| d.ip == ip))
    }

    async fn is_device_verified(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .devices
            .iter()
            .any(|d| d.client_id == client_id && d.ip == ip))
    }

    async fn register_device(&self, device: &Device) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        inner
            .devices
            .retain(|d| !(d.client_id == device.client_id && d.ip == device.ip));
        inner.devices.push(device.clone());
        Ok(())
    }

    async fn devices_of(&self, client_id: ClientId) -> RepoResult<Vec<Device>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .devices
            .iter()
            .filter(|d| d.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn logout(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.devices.len();
        inner
            .devices
            .retain(|d| !(d.client_id == client_id && d.ip == ip));
        Ok(inner.devices.len() < before)
    }

    async fn logout_all_devices(&self, client_id: ClientId) -> RepoResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.devices.len();
        inner.devices.retain(|d| d.client_id != client_id);
        Ok((before - inner.devices.len()) as u64)
    }
}

#[async_trait]
impl ChatSessionRepository for MemoryStore {
    async fn chat_sessions_of(&self, client_id: ClientId) -> RepoResult<Vec<ChatSession>> {
        self.check()?;
        let inner = self.inner.lock();
        let mut sessions: Vec<ChatSession> = inner
            .sessions
            .iter()
            .filter(|(_, s)| s.members.contains(&client_id))
            .map(|(id, s)| ChatSession::new(*id, s.members.clone()))
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn members_of(&self, session_id: ChatSessionId) -> RepoResult<Vec<ClientId>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get(&session_id)
            .map(|s| s.members.clone())
            .unwrap_or_default())
    }

    async fn chat_session_between(
        &self,
        a: ClientId,
        b: ClientId,
    ) -> RepoResult<Option<ChatSessionId>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .iter()
            .find(|(_, s)| s.members.len() == 2 && s.members.contains(&a) && s.members.contains(&b))
            .map(|(id, _)| *id))
    }

    async fn chat_requests_of(&self, receiver: ClientId) -> RepoResult<Vec<ClientId>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .chat_requests
            .iter()
            .filter(|(_, r)| *r == receiver)
            .map(|(s, _)| *s)
            .collect())
    }

    async fn send_chat_request(&self, sender: ClientId, receiver: ClientId) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        if inner.chat_requests.contains(&(sender, receiver)) {
            return Err(DomainError::ChatRequestExists);
        }
        inner.chat_requests.push((sender, receiver));
        Ok(())
    }

    async fn accept_chat_request(
        &self,
        receiver: ClientId,
        sender: ClientId,
        session_id: ChatSessionId,
    ) -> RepoResult<ChatSession> {
        self.check()?;
        let mut inner = self.inner.lock();
        let Some(pos) = inner
            .chat_requests
            .iter()
            .position(|pair| *pair == (sender, receiver))
        else {
            return Err(DomainError::ChatRequestNotFound(sender));
        };
        if inner.sessions.contains_key(&session_id) {
            return Err(DomainError::InternalError(format!(
                "Chat session {session_id} already exists"
            )));
        }

        inner.chat_requests.remove(pos);
        let members = vec![sender, receiver];
        inner.sessions.insert(
            session_id,
            StoredSession {
                members: members.clone(),
                last_message_id: 0,
                messages: BTreeMap::new(),
            },
        );
        Ok(ChatSession::new(session_id, members))
    }

    async fn decline_chat_request(&self, receiver: ClientId, sender: ClientId) -> RepoResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock();
        let before = inner.chat_requests.len();
        inner
            .chat_requests
            .retain(|pair| *pair != (sender, receiver));
        Ok(inner.chat_requests.len() < before)
    }

    async fn delete_chat_session(&self, session_id: ChatSessionId) -> RepoResult<()> {
        self.check()?;
        self.inner
            .lock()
            .sessions
            .remove(&session_id)
            .map(|_| ())
            .ok_or(DomainError::ChatSessionNotFound(session_id))
    }

    async fn chat_session_ids_in_use(&self) -> RepoResult<Vec<ChatSessionId>> {
        self.check()?;
        Ok(self.inner.lock().sessions.keys().copied().collect())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn add_message(&self, message: &Message) -> RepoResult<()> {
        self.check()?;
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(&message.session_id)
            .ok_or(DomainError::ChatSessionNotFound(message.session_id))?;
        if session.messages.contains_key(&message.id) {
            return Err(DomainError::InternalError(format!(
                "Message {} already exists in chat session {}",
                message.id, message.session_id
            )));
        }
        session.last_message_id = session.last_message_id.max(message.id.into_inner());
        session.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn select_messages(
        &self,
        session_id: ChatSessionId,
        offset: u32,
        count: u32,
    ) -> RepoResult<Vec<Message>> {
        self.check()?;
        let inner = self.inner.lock();
        let Some(session) = inner.sessions.get(&session_id) else {
            return Ok(Vec::new());
        };
        let mut page: Vec<Message> = session
            .messages
            .values()
            .rev()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn find_message(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<Message>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get(&session_id)
            .and_then(|s| s.messages.get(&message_id).cloned()))
    }

    async fn delete_message(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<bool> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get_mut(&session_id)
            .and_then(|s| s.messages.remove(&message_id))
            .is_some())
    }

    async fn file(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<(String, Vec<u8>)>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get(&session_id)
            .and_then(|s| s.messages.get(&message_id))
            .and_then(|m| m.file_name.clone().map(|name| (name, m.payload.clone()))))
    }

    async fn max_message_id(&self, session_id: ChatSessionId) -> RepoResult<Option<MessageId>> {
        self.check()?;
        Ok(self
            .inner
            .lock()
            .sessions
            .get(&session_id)
            .map(|s| s.last_message_id)
            .filter(|id| *id > 0)
            .map(MessageId::new))
    }
}
