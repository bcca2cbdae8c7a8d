//! Database models
//!
//! Row types with SQLx `FromRow` derives; converted to domain entities in `mappers`.

mod account;
mod device;
mod message;

pub use account::{AccountModel, CredentialsModel};
pub use device::DeviceModel;
pub use message::MessageModel;
