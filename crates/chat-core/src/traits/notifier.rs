//! Out-of-band delivery of verification codes

use async_trait::async_trait;

use crate::error::DomainError;

/// Delivers one-time verification codes to an email address.
///
/// Implementations may be slow; callers hand codes to a background queue
/// instead of awaiting delivery on the connection task.
#[async_trait]
pub trait VerificationNotifier: Send + Sync {
    async fn send_verification_email(&self, email: &str, code: &str) -> Result<(), DomainError>;
}
