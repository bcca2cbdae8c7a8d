//! Domain entities - core business objects

mod account;
mod chat_session;
mod device;
mod message;

pub use account::{Account, Credentials, NewAccount};
pub use chat_session::ChatSession;
pub use device::Device;
pub use message::{ContentType, Message};
