//! Protocol stage machine
//!
//! Every connection is in exactly one stage. Stage handlers return the stage
//! to move to, and [`StageMachine::transition`] performs the move together
//! with its side effects: entering Authenticated activates the client's chat
//! sessions, leaving it detaches the connection again, and every return to
//! Start re-announces whether the address is verified.

mod authenticated;
mod entry;
mod start;
mod verification;

pub use authenticated::AuthenticatedState;
pub use entry::EntryState;
pub use verification::{PendingEntry, VerificationState};

use chat_common::{AppError, FrameLimits};
use chat_core::{ClientId, DomainError};
use chat_service::{AccountService, ServiceError, ServiceResult};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::connection::Connection;
use crate::dispatch::AuthContext;
use crate::error::HandlerError;
use crate::protocol::{ClientMessage, EntryResultCode, ServerMessage};
use crate::server::GatewayState;

/// Device description used when the client never sent one
pub const DEFAULT_DEVICE_INFO: &str = "Unknown device";

/// Longest device description kept, in characters
pub const MAX_DEVICE_INFO_CHARS: usize = 256;

/// The stage a connection is in
pub enum ConnectionStage {
    /// Choosing between login and account creation
    Start,
    /// Collecting credentials
    Entry(EntryState),
    /// Waiting for the emailed code
    Verification(VerificationState),
    /// Logged in; content and commands
    Authenticated(AuthenticatedState),
}

impl ConnectionStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Entry(_) => "ENTRY",
            Self::Verification(_) => "VERIFICATION",
            Self::Authenticated(_) => "AUTHENTICATED",
        }
    }

    /// Largest inbound frame accepted in this stage
    pub fn max_frame_len(&self, limits: &FrameLimits) -> usize {
        match self {
            Self::Authenticated(_) => limits.authenticated_frame_bytes,
            _ => limits.unauthenticated_frame_bytes,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl std::fmt::Debug for ConnectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of handling one message: `Some` moves to a new stage
pub(crate) type StageResult = Result<Option<ConnectionStage>, HandlerError>;

/// Drives one connection through the protocol stages
pub struct StageMachine {
    state: GatewayState,
    connection: Arc<Connection>,
    stage: ConnectionStage,
}

impl StageMachine {
    pub fn new(state: GatewayState, connection: Arc<Connection>) -> Self {
        Self {
            state,
            connection,
            stage: ConnectionStage::Start,
        }
    }

    pub fn stage(&self) -> &ConnectionStage {
        &self.stage
    }

    pub fn max_frame_len(&self) -> usize {
        self.stage.max_frame_len(&self.state.config().limits)
    }

    /// Greet a new connection
    pub async fn on_connect(&mut self) {
        self.send_ip_verified().await;
    }

    /// Route one inbound message to the current stage
    #[instrument(
        skip_all,
        fields(conn_id = %self.connection.id(), stage = self.stage.name(), message = message.name())
    )]
    pub async fn handle(&mut self, message: ClientMessage) {
        let Self {
            state,
            connection,
            stage,
        } = self;

        let result = match stage {
            ConnectionStage::Start => start::handle(state, connection, message).await,
            ConnectionStage::Entry(entry) => entry::handle(state, connection, entry, message).await,
            ConnectionStage::Verification(pending) => {
                verification::handle(state, connection, pending, message).await
            }
            ConnectionStage::Authenticated(auth) => auth.handle(message).await,
        };

        match result {
            Ok(Some(next)) => self.transition(next).await,
            Ok(None) => {}
            Err(e) => self.report(&e),
        }
    }

    /// Replace the current stage
    pub async fn transition(&mut self, next: ConnectionStage) {
        let from = self.stage.name();
        let previous = std::mem::replace(&mut self.stage, next);
        if let ConnectionStage::Authenticated(auth) = previous {
            auth.close();
        }

        match &self.stage {
            ConnectionStage::Start => self.send_ip_verified().await,
            ConnectionStage::Authenticated(auth) => auth.open(),
            _ => {}
        }

        debug!(conn_id = %self.connection.id(), from, to = self.stage.name(), "Stage transition");
    }

    /// Return to Start, as requested by a logout
    pub async fn reset(&mut self) {
        if !matches!(self.stage, ConnectionStage::Start) {
            self.transition(ConnectionStage::Start).await;
        }
    }

    /// Release shared state once the transport is gone
    pub fn shutdown(&mut self) {
        if let ConnectionStage::Authenticated(auth) =
            std::mem::replace(&mut self.stage, ConnectionStage::Start)
        {
            auth.close();
        }
    }

    /// Tell the peer about a failed message
    pub fn report(&self, e: &HandlerError) {
        if e.is_server_error() {
            error!(conn_id = %self.connection.id(), error = %e, "Message handling failed");
        } else {
            debug!(conn_id = %self.connection.id(), error = %e, "Message rejected");
        }
        self.connection
            .send_message(&ServerMessage::info(e.client_message()));
    }

    async fn send_ip_verified(&self) {
        let verified = match AccountService::new(self.state.service_context())
            .is_ip_verified(self.connection.ip())
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                warn!(conn_id = %self.connection.id(), error = %e, "IP verification lookup failed");
                false
            }
        };
        self.connection
            .send_message(&ServerMessage::IpVerified(verified));
    }
}

impl std::fmt::Debug for StageMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageMachine")
            .field("connection", &self.connection)
            .field("stage", &self.stage)
            .finish()
    }
}

/// Register the device, attach the connection to its identity and build
/// the authenticated stage
async fn authenticate(
    state: &GatewayState,
    connection: &Arc<Connection>,
    client_id: ClientId,
    device_info: &str,
) -> ServiceResult<ConnectionStage> {
    let services = state.service_context();
    AccountService::new(services)
        .register_device(client_id, connection.ip(), device_info)
        .await?;
    let identity = state
        .connection_manager()
        .attach(connection, client_id, services)
        .await?;

    info!(conn_id = %connection.id(), client_id = %client_id, "Client authenticated");
    Ok(ConnectionStage::Authenticated(AuthenticatedState::new(
        AuthContext::new(state.clone(), Arc::clone(connection), identity),
    )))
}

/// Result code reported for a failed entry step
fn entry_result_code(e: &ServiceError) -> EntryResultCode {
    match e {
        ServiceError::App(AppError::InvalidCredentials) => EntryResultCode::InvalidCredentials,
        ServiceError::Domain(DomainError::EmailAlreadyExists) => EntryResultCode::EmailInUse,
        ServiceError::NotAvailable(_) => EntryResultCode::Unavailable,
        e if e.is_client_error() => EntryResultCode::ValidationFailed,
        _ => EntryResultCode::ServerError,
    }
}

/// Send `ENTRY_RESULT` for a failed entry step
fn report_entry_failure(connection: &Connection, e: &ServiceError) {
    if e.is_client_error() {
        debug!(conn_id = %connection.id(), error = %e, "Entry rejected");
    } else {
        error!(conn_id = %connection.id(), error = %e, "Entry failed");
    }
    connection.send_message(&ServerMessage::entry_result(
        entry_result_code(e),
        e.client_message(),
    ));
}
