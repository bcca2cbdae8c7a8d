//! # chat-core
//!
//! Domain layer containing identifiers, entities, and the data-access and
//! notification traits the rest of the server is written against.
//! This crate has zero dependencies on infrastructure (database, transport, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Account, ChatSession, ContentType, Credentials, Device, Message, NewAccount};
pub use error::DomainError;
pub use traits::{
    AccountRepository, ChatSessionRepository, DeviceRepository, MessageRepository, RepoResult,
    VerificationNotifier,
};
pub use value_objects::{ChatSessionId, ClientId, IdParseError, MessageId};
