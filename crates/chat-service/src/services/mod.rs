//! Business logic services
//!
//! This module contains the service layer that validates requests,
//! allocates identifiers and orchestrates storage calls.

pub mod account;
pub mod chat;
pub mod context;
pub mod error;
pub mod verification;

// Re-export all services for convenience
pub use account::{AccountService, CreatedAccount};
pub use chat::{ChatService, MessageBody, MAX_FETCH_COUNT};
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult, GENERIC_FAILURE};
pub use verification::{VerificationCode, VerificationOutcome};
