//! Verification stage: confirm the emailed code

use chat_core::ClientId;
use chat_service::{AccountService, ServiceError, VerificationCode, VerificationOutcome};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{authenticate, ConnectionStage, StageResult};
use crate::connection::Connection;
use crate::error::HandlerError;
use crate::protocol::{ClientMessage, EntryResultCode, ServerMessage, VerificationAction};
use crate::server::GatewayState;

/// What a correct code completes
pub enum PendingEntry {
    Login {
        client_id: ClientId,
        email: String,
    },
    CreateAccount {
        email: String,
        username: String,
        password: String,
    },
}

impl PendingEntry {
    pub fn email(&self) -> &str {
        match self {
            Self::Login { email, .. } | Self::CreateAccount { email, .. } => email,
        }
    }
}

impl std::fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { client_id, email } => f
                .debug_struct("Login")
                .field("client_id", client_id)
                .field("email", email)
                .finish(),
            Self::CreateAccount { email, username, .. } => f
                .debug_struct("CreateAccount")
                .field("email", email)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub struct VerificationState {
    pending: PendingEntry,
    code: VerificationCode,
    device_info: String,
}

impl VerificationState {
    pub fn pending(&self) -> &PendingEntry {
        &self.pending
    }

    pub fn attempts_left(&self) -> u32 {
        self.code.attempts_left()
    }
}

/// Issue and queue a code, then tell the peer to expect it
pub(super) async fn begin(
    state: &GatewayState,
    connection: &Connection,
    pending: PendingEntry,
    device_info: &str,
) -> Result<ConnectionStage, HandlerError> {
    let code = AccountService::new(state.service_context())
        .start_verification(pending.email())
        .await?;

    debug!(conn_id = %connection.id(), pending = ?pending, "Verification started");
    connection.send_message(&ServerMessage::entry_result(
        EntryResultCode::VerificationRequired,
        format!("A verification code was sent to {}", pending.email()),
    ));

    Ok(ConnectionStage::Verification(VerificationState {
        pending,
        code,
        device_info: device_info.to_string(),
    }))
}

pub(super) async fn handle(
    state: &GatewayState,
    connection: &Arc<Connection>,
    verification: &mut VerificationState,
    message: ClientMessage,
) -> StageResult {
    match message {
        ClientMessage::VerificationCode(guess) => match verification.code.check(&guess) {
            VerificationOutcome::Success => complete(state, connection, verification).await,
            VerificationOutcome::Retry { attempts_left } => {
                connection.send_message(&ServerMessage::VerificationResult {
                    success: false,
                    attempts_left,
                    message: format!("Incorrect code, {attempts_left} attempts left"),
                });
                Ok(None)
            }
            VerificationOutcome::Exhausted => Ok(Some(fail(connection, "Too many incorrect attempts"))),
            VerificationOutcome::Expired => {
                Ok(Some(fail(connection, "The verification code has expired")))
            }
        },
        ClientMessage::VerificationAction(VerificationAction::ResendCode) => {
            if verification.code.is_expired() {
                return Ok(Some(fail(connection, "The verification code has expired")));
            }
            AccountService::new(state.service_context())
                .resend_verification(verification.pending.email(), &verification.code)
                .await?;
            connection.send_message(&ServerMessage::info("Verification code resent"));
            Ok(None)
        }
        other => Err(HandlerError::unexpected("VERIFICATION", other.name())),
    }
}

/// Run the entry's success action and authenticate
async fn complete(
    state: &GatewayState,
    connection: &Arc<Connection>,
    verification: &VerificationState,
) -> StageResult {
    let accounts = AccountService::new(state.service_context());

    let client_id = match &verification.pending {
        PendingEntry::Login { client_id, .. } => *client_id,
        PendingEntry::CreateAccount {
            email,
            username,
            password,
        } => match accounts.create_account(email, username, password).await {
            Ok(created) => {
                // The only time the plaintext codes exist
                connection.send_message(&ServerMessage::BackupCodes(created.backup_codes));
                created.client_id
            }
            Err(e) => return Ok(Some(fail_with(connection, &e))),
        },
    };

    match authenticate(state, connection, client_id, &verification.device_info).await {
        Ok(next) => {
            info!(conn_id = %connection.id(), client_id = %client_id, "Verification succeeded");
            connection.send_message(&ServerMessage::VerificationResult {
                success: true,
                attempts_left: verification.code.attempts_left(),
                message: "Verification successful".to_string(),
            });
            Ok(Some(next))
        }
        Err(e) => Ok(Some(fail_with(connection, &e))),
    }
}

/// End the flow and go back to Start
fn fail(connection: &Connection, reason: &str) -> ConnectionStage {
    debug!(conn_id = %connection.id(), reason, "Verification failed");
    connection.send_message(&ServerMessage::VerificationResult {
        success: false,
        attempts_left: 0,
        message: reason.to_string(),
    });
    ConnectionStage::Start
}

fn fail_with(connection: &Connection, e: &ServiceError) -> ConnectionStage {
    if !e.is_client_error() {
        error!(conn_id = %connection.id(), error = %e, "Completing verification failed");
    }
    fail(connection, &e.client_message())
}
