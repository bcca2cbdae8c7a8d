//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::{ChatSessionId, ClientId, MessageId};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Chat session not found: {0}")]
    ChatSessionNotFound(ChatSessionId),

    #[error("Message {message_id} not found in chat session {session_id}")]
    MessageNotFound {
        session_id: ChatSessionId,
        message_id: MessageId,
    },

    #[error("No pending chat request from client {0}")]
    ChatRequestNotFound(ClientId),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not a member of chat session {0}")]
    NotSessionMember(ChatSessionId),

    #[error("Not message author")]
    NotMessageAuthor,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Email already in use")]
    EmailAlreadyExists,

    #[error("Chat request already pending")]
    ChatRequestExists,

    #[error("Already in a chat session with this client")]
    AlreadyInChatSession,

    #[error("Cannot send a chat request to yourself")]
    CannotRequestSelf,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get a stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::ClientNotFound(_) => "UNKNOWN_CLIENT",
            Self::ChatSessionNotFound(_) => "UNKNOWN_CHAT_SESSION",
            Self::MessageNotFound { .. } => "UNKNOWN_MESSAGE",
            Self::ChatRequestNotFound(_) => "UNKNOWN_CHAT_REQUEST",

            // Authorization
            Self::NotSessionMember(_) => "NOT_SESSION_MEMBER",
            Self::NotMessageAuthor => "NOT_MESSAGE_AUTHOR",

            // Conflict
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::ChatRequestExists => "CHAT_REQUEST_EXISTS",
            Self::AlreadyInChatSession => "ALREADY_IN_CHAT_SESSION",
            Self::CannotRequestSelf => "CANNOT_REQUEST_SELF",

            // Infrastructure
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::NotificationError(_) => "NOTIFICATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error came from the storage or delivery backends
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::NotificationError(_) | Self::InternalError(_)
        )
    }
}
