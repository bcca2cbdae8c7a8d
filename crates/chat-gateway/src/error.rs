//! Handler error types

use chat_service::ServiceError;
use thiserror::Error;

use crate::protocol::{FrameError, ProtocolError};

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Malformed payload
    #[error("Invalid message: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame rejected by the codec
    #[error("{0}")]
    Frame(#[from] FrameError),

    /// Valid message sent in the wrong stage
    #[error("{message} is not accepted during {stage}")]
    UnexpectedMessage {
        stage: &'static str,
        message: &'static str,
    },

    /// Service error
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl HandlerError {
    pub fn unexpected(stage: &'static str, message: &'static str) -> Self {
        Self::UnexpectedMessage { stage, message }
    }

    /// Whether the server, not the peer, is at fault
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Service(e) if !e.is_client_error())
    }

    /// Text safe to send to the peer
    pub fn client_message(&self) -> String {
        match self {
            Self::Service(e) => e.client_message(),
            other => other.to_string(),
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
