//! Serialized delivery of verification emails
//!
//! Connection tasks hand codes to [`EmailQueue`] and move on. A single
//! worker drains the queue in order and calls the notifier, so slow mail
//! delivery never stalls the protocol.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use chat_core::traits::VerificationNotifier;
use chat_core::DomainError;

use crate::services::error::{ServiceError, ServiceResult};

const QUEUE_CAPACITY: usize = 1024;

struct EmailJob {
    email: String,
    code: String,
}

/// Handle to the background email worker
#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::Sender<EmailJob>,
}

impl EmailQueue {
    /// Spawn the worker on the current runtime
    pub fn spawn(notifier: Arc<dyn VerificationNotifier>) -> Self {
        let (tx, mut rx) = mpsc::channel::<EmailJob>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = notifier.send_verification_email(&job.email, &job.code).await {
                    error!(email = %job.email, error = %e, "Failed to send verification email");
                }
            }
            debug!("Email queue closed");
        });

        Self { tx }
    }

    /// Queue a code for delivery. Waits only if the queue is full.
    #[instrument(skip(self, code))]
    pub async fn enqueue(&self, email: &str, code: &str) -> ServiceResult<()> {
        self.tx
            .send(EmailJob {
                email: email.to_string(),
                code: code.to_string(),
            })
            .await
            .map_err(|_| ServiceError::internal("Email queue worker has stopped"))
    }
}

impl std::fmt::Debug for EmailQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Notifier that only records the dispatch in the log.
///
/// Used when no mail transport is configured. The code itself is never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl VerificationNotifier for LogNotifier {
    async fn send_verification_email(&self, email: &str, _code: &str) -> Result<(), DomainError> {
        info!(email = %email, "Verification code dispatched");
        Ok(())
    }
}
