//! # chat-service
//!
//! Application layer containing business logic, identifier allocation,
//! and the verification email queue.

pub mod email;
pub mod ids;
pub mod services;

pub use email::{EmailQueue, LogNotifier};
pub use ids::{IdPool, IdPoolError, MessageIdCounter};
pub use services::{
    AccountService, ChatService, CreatedAccount, MessageBody, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult, VerificationCode, VerificationOutcome,
    GENERIC_FAILURE, MAX_FETCH_COUNT,
};
