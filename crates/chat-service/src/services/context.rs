//! Service context - dependency container for services
//!
//! Holds all repositories, ID allocators, and the email queue needed by services.

use std::sync::Arc;

use chat_common::{IdPoolConfig, VerificationConfig};
use chat_core::traits::{
    AccountRepository, ChatSessionRepository, DeviceRepository, MessageRepository,
    VerificationNotifier,
};

use crate::email::EmailQueue;
use crate::ids::{AccountIds, ChatSessionIdPool, ChatSessionIds, ClientIdPool, IdPool, MessageIdCounter};

use super::error::{ServiceError, ServiceResult};

/// Service context containing all dependencies
///
/// This is the main dependency container that gets passed to all services.
/// It provides access to:
/// - Storage repositories
/// - Client, chat-session and message ID allocators
/// - The verification email queue
#[derive(Clone)]
pub struct ServiceContext {
    // Repositories
    account_repo: Arc<dyn AccountRepository>,
    device_repo: Arc<dyn DeviceRepository>,
    chat_session_repo: Arc<dyn ChatSessionRepository>,
    message_repo: Arc<dyn MessageRepository>,

    // ID allocation
    client_ids: Arc<ClientIdPool>,
    chat_session_ids: Arc<ChatSessionIdPool>,
    message_ids: Arc<MessageIdCounter>,

    email_queue: EmailQueue,
    verification: VerificationConfig,
}

impl ServiceContext {
    /// Create a new service context with all dependencies.
    ///
    /// Must be called inside a Tokio runtime; the email worker is spawned here.
    pub fn new(
        account_repo: Arc<dyn AccountRepository>,
        device_repo: Arc<dyn DeviceRepository>,
        chat_session_repo: Arc<dyn ChatSessionRepository>,
        message_repo: Arc<dyn MessageRepository>,
        notifier: Arc<dyn VerificationNotifier>,
        verification: VerificationConfig,
        id_pools: &IdPoolConfig,
    ) -> Self {
        let client_ids = IdPool::new(
            "client",
            1,
            id_pools.client_id_max,
            id_pools.batch_size,
            Arc::new(AccountIds(Arc::clone(&account_repo))),
        );
        let chat_session_ids = IdPool::new(
            "chat session",
            1,
            id_pools.chat_session_id_max,
            id_pools.batch_size,
            Arc::new(ChatSessionIds(Arc::clone(&chat_session_repo))),
        );

        Self {
            account_repo,
            device_repo,
            chat_session_repo,
            message_repo,
            client_ids: Arc::new(client_ids),
            chat_session_ids: Arc::new(chat_session_ids),
            message_ids: Arc::new(MessageIdCounter::new()),
            email_queue: EmailQueue::spawn(notifier),
            verification,
        }
    }

    // === Repositories ===

    /// Get the account repository
    pub fn account_repo(&self) -> &dyn AccountRepository {
        self.account_repo.as_ref()
    }

    /// Get the device repository
    pub fn device_repo(&self) -> &dyn DeviceRepository {
        self.device_repo.as_ref()
    }

    /// Get the chat session repository
    pub fn chat_session_repo(&self) -> &dyn ChatSessionRepository {
        self.chat_session_repo.as_ref()
    }

    /// Get the message repository
    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.message_repo.as_ref()
    }

    // === ID allocation ===

    pub fn client_ids(&self) -> &ClientIdPool {
        self.client_ids.as_ref()
    }

    pub fn chat_session_ids(&self) -> &ChatSessionIdPool {
        self.chat_session_ids.as_ref()
    }

    pub fn message_ids(&self) -> &MessageIdCounter {
        self.message_ids.as_ref()
    }

    // === Verification ===

    pub fn email_queue(&self) -> &EmailQueue {
        &self.email_queue
    }

    pub fn verification(&self) -> &VerificationConfig {
        &self.verification
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("client_ids", &self.client_ids)
            .field("chat_session_ids", &self.chat_session_ids)
            .field("email_queue", &self.email_queue)
            .field("verification", &self.verification)
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
#[derive(Default)]
pub struct ServiceContextBuilder {
    account_repo: Option<Arc<dyn AccountRepository>>,
    device_repo: Option<Arc<dyn DeviceRepository>>,
    chat_session_repo: Option<Arc<dyn ChatSessionRepository>>,
    message_repo: Option<Arc<dyn MessageRepository>>,
    notifier: Option<Arc<dyn VerificationNotifier>>,
    verification: VerificationConfig,
    id_pools: IdPoolConfig,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one store for every repository
    pub fn store<S>(self, store: S) -> Self
    where
        S: AccountRepository
            + DeviceRepository
            + ChatSessionRepository
            + MessageRepository
            + Clone
            + 'static,
    {
        self.account_repo(Arc::new(store.clone()))
            .device_repo(Arc::new(store.clone()))
            .chat_session_repo(Arc::new(store.clone()))
            .message_repo(Arc::new(store))
    }

    pub fn account_repo(mut self, repo: Arc<dyn AccountRepository>) -> Self {
        self.account_repo = Some(repo);
        self
    }

    pub fn device_repo(mut self, repo: Arc<dyn DeviceRepository>) -> Self {
        self.device_repo = Some(repo);
        self
    }

    pub fn chat_session_repo(mut self, repo: Arc<dyn ChatSessionRepository>) -> Self {
        self.chat_session_repo = Some(repo);
        self
    }

    pub fn message_repo(mut self, repo: Arc<dyn MessageRepository>) -> Self {
        self.message_repo = Some(repo);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn VerificationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn verification(mut self, config: VerificationConfig) -> Self {
        self.verification = config;
        self
    }

    pub fn id_pools(mut self, config: IdPoolConfig) -> Self {
        self.id_pools = config;
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        Ok(ServiceContext::new(
            self.account_repo
                .ok_or_else(|| ServiceError::validation("account_repo is required"))?,
            self.device_repo
                .ok_or_else(|| ServiceError::validation("device_repo is required"))?,
            self.chat_session_repo
                .ok_or_else(|| ServiceError::validation("chat_session_repo is required"))?,
            self.message_repo
                .ok_or_else(|| ServiceError::validation("message_repo is required"))?,
            self.notifier
                .ok_or_else(|| ServiceError::validation("notifier is required"))?,
            self.verification,
            &self.id_pools,
        ))
    }
}
