//! Ports implemented by the infrastructure layer

mod notifier;
mod repositories;

pub use notifier::VerificationNotifier;
pub use repositories::{
    AccountRepository, ChatSessionRepository, DeviceRepository, MessageRepository, RepoResult,
};
