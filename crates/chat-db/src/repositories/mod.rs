//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in chat-core.

mod account;
mod chat_session;
mod device;
mod error;
mod message;

pub use account::PgAccountRepository;
pub use chat_session::PgChatSessionRepository;
pub use device::PgDeviceRepository;
pub use message::PgMessageRepository;
