//! Service layer error types
//!
//! Provides a unified error type for all service operations.

use chat_common::AppError;
use chat_core::DomainError;
use std::fmt;

use crate::ids::IdPoolError;

/// Text shown to a peer when the failure is on our side
pub const GENERIC_FAILURE: &str = "Request failed due to a server error, please try again later";

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Domain rule violation
    Domain(DomainError),

    /// Application error (credentials, validation, etc.)
    App(AppError),

    /// Validation error
    Validation(String),

    /// An ID space ran dry
    NotAvailable(String),

    /// Internal error
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::App(e) => write!(f, "{e}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::NotAvailable(msg) => write!(f, "Not available: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::App(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code for logs
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotAvailable(_) => "NOT_AVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the peer's request caused this error
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Domain(e) => !e.is_infrastructure(),
            Self::App(e) => e.is_client_error(),
            Self::Validation(_) => true,
            Self::NotAvailable(_) | Self::Internal(_) => false,
        }
    }

    /// Text safe to send to the peer.
    ///
    /// Server-side failures are replaced with a generic message; the details
    /// belong in the log.
    pub fn client_message(&self) -> String {
        match self {
            Self::NotAvailable(msg) => format!("{msg}, please try again later"),
            Self::App(AppError::Validation(msg)) | Self::Validation(msg) => msg.clone(),
            e if e.is_client_error() => e.to_string(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(e) => Self::Domain(e),
            other => Self::App(other),
        }
    }
}

impl From<IdPoolError> for ServiceError {
    fn from(err: IdPoolError) -> Self {
        match err {
            IdPoolError::NotAvailable(space) => Self::NotAvailable(format!("No free {space} IDs")),
            IdPoolError::Storage(e) => Self::Domain(e),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
