//! Chat service
//!
//! Chat requests, chat sessions and the messages inside them. Every
//! operation persists first; callers update in-memory state only after
//! a successful return.

use chat_core::entities::{ChatSession, ContentType, Message};
use chat_core::value_objects::{ChatSessionId, ClientId, MessageId};
use chat_core::DomainError;
use tracing::{info, instrument};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Upper bound on one page of history
pub const MAX_FETCH_COUNT: u32 = 100;

/// Content submitted by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(Vec<u8>),
    Image(Vec<u8>),
    File { name: String, bytes: Vec<u8> },
}

impl MessageBody {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text(_) => ContentType::Text,
            Self::Image(_) => ContentType::Image,
            Self::File { .. } => ContentType::File,
        }
    }
}

/// Chat service
pub struct ChatService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ChatService<'a> {
    /// Create a new ChatService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // === Chat requests ===

    #[instrument(skip(self))]
    pub async fn chat_requests_of(&self, client_id: ClientId) -> ServiceResult<Vec<ClientId>> {
        Ok(self.ctx.chat_session_repo().chat_requests_of(client_id).await?)
    }

    /// Ask `receiver` to open a chat session
    #[instrument(skip(self))]
    pub async fn send_chat_request(&self, sender: ClientId, receiver: ClientId) -> ServiceResult<()> {
        if sender == receiver {
            return Err(DomainError::CannotRequestSelf.into());
        }

        if self.ctx.account_repo().find_by_id(receiver).await?.is_none() {
            return Err(DomainError::ClientNotFound(receiver).into());
        }

        let repo = self.ctx.chat_session_repo();
        if repo.chat_session_between(sender, receiver).await?.is_some() {
            return Err(DomainError::AlreadyInChatSession.into());
        }

        repo.send_chat_request(sender, receiver).await?;
        info!(sender = %sender, receiver = %receiver, "Chat request sent");
        Ok(())
    }

    /// Turn a pending request into a chat session.
    ///
    /// Allocates exactly one session ID and returns it to the pool if the
    /// session cannot be persisted.
    #[instrument(skip(self))]
    pub async fn accept_chat_request(
        &self,
        receiver: ClientId,
        sender: ClientId,
    ) -> ServiceResult<ChatSession> {
        let session_id = self.ctx.chat_session_ids().retrieve_and_delete().await?;

        match self
            .ctx
            .chat_session_repo()
            .accept_chat_request(receiver, sender, session_id)
            .await
        {
            Ok(session) => {
                info!(session_id = %session_id, "Chat session created");
                Ok(session)
            }
            Err(e) => {
                self.ctx.chat_session_ids().undo(session_id).await;
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn decline_chat_request(&self, receiver: ClientId, sender: ClientId) -> ServiceResult<()> {
        if !self
            .ctx
            .chat_session_repo()
            .decline_chat_request(receiver, sender)
            .await?
        {
            return Err(DomainError::ChatRequestNotFound(sender).into());
        }
        Ok(())
    }

    // === Chat sessions ===

    #[instrument(skip(self))]
    pub async fn chat_sessions_of(&self, client_id: ClientId) -> ServiceResult<Vec<ChatSession>> {
        Ok(self.ctx.chat_session_repo().chat_sessions_of(client_id).await?)
    }

    /// Members of a session, failing unless `client_id` is one of them
    #[instrument(skip(self))]
    pub async fn members_for(
        &self,
        client_id: ClientId,
        session_id: ChatSessionId,
    ) -> ServiceResult<Vec<ClientId>> {
        let members = self.ctx.chat_session_repo().members_of(session_id).await?;
        if members.is_empty() {
            return Err(DomainError::ChatSessionNotFound(session_id).into());
        }
        if !members.contains(&client_id) {
            return Err(DomainError::NotSessionMember(session_id).into());
        }
        Ok(members)
    }

    /// Delete a session on behalf of one of its members, returning all members
    #[instrument(skip(self))]
    pub async fn delete_chat_session(
        &self,
        client_id: ClientId,
        session_id: ChatSessionId,
    ) -> ServiceResult<Vec<ClientId>> {
        let members = self.members_for(client_id, session_id).await?;
        self.ctx
            .chat_session_repo()
            .delete_chat_session(session_id)
            .await?;
        self.ctx.message_ids().forget(session_id);

        info!(session_id = %session_id, "Chat session deleted");
        Ok(members)
    }

    // === Messages ===

    /// Persist a message under the next ID of its session
    #[instrument(skip(self, body), fields(content_type = body.content_type().name()))]
    pub async fn post_message(
        &self,
        author: ClientId,
        session_id: ChatSessionId,
        body: MessageBody,
    ) -> ServiceResult<Message> {
        self.members_for(author, session_id).await?;

        let id = self
            .ctx
            .message_ids()
            .increment_and_get(session_id, self.ctx.message_repo())
            .await?;

        let message = match body {
            MessageBody::Text(bytes) => {
                Message::new(session_id, id, author, ContentType::Text, bytes)
            }
            MessageBody::Image(bytes) => {
                Message::new(session_id, id, author, ContentType::Image, bytes)
            }
            MessageBody::File { name, bytes } => Message::new_file(session_id, id, author, name, bytes),
        };

        self.ctx.message_repo().add_message(&message).await?;
        Ok(message)
    }

    /// Delete a message; only its author may do so
    #[instrument(skip(self))]
    pub async fn delete_message(
        &self,
        client_id: ClientId,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> ServiceResult<()> {
        self.members_for(client_id, session_id).await?;

        let repo = self.ctx.message_repo();
        let not_found = || DomainError::MessageNotFound {
            session_id,
            message_id,
        };

        let message = repo
            .find_message(session_id, message_id)
            .await?
            .ok_or_else(not_found)?;
        if message.author_id != client_id {
            return Err(DomainError::NotMessageAuthor.into());
        }

        if !repo.delete_message(session_id, message_id).await? {
            return Err(not_found().into());
        }
        Ok(())
    }

    /// Page of history: skip the `offset` newest, return up to `count` oldest-first
    #[instrument(skip(self))]
    pub async fn fetch_messages(
        &self,
        client_id: ClientId,
        session_id: ChatSessionId,
        offset: u32,
        count: u32,
    ) -> ServiceResult<Vec<Message>> {
        self.members_for(client_id, session_id).await?;
        Ok(self
            .ctx
            .message_repo()
            .select_messages(session_id, offset, count.min(MAX_FETCH_COUNT))
            .await?)
    }

    /// Name and bytes of a file message
    #[instrument(skip(self))]
    pub async fn download_file(
        &self,
        client_id: ClientId,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> ServiceResult<(String, Vec<u8>)> {
        self.members_for(client_id, session_id).await?;
        self.ctx
            .message_repo()
            .file(session_id, message_id)
            .await?
            .ok_or_else(|| {
                DomainError::MessageNotFound {
                    session_id,
                    message_id,
                }
                .into()
            })
    }
}
