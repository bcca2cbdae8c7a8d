//! Command dispatch for authenticated connections
//!
//! Content and light commands run inline on the connection task. Heavy
//! commands are queued on the connection's [`CommandQueue`] so they execute
//! one at a time in arrival order.

mod content;
mod heavy;
mod light;
mod queue;

pub use queue::CommandQueue;

use chat_core::ClientId;
use chat_service::{ServiceContext, ServiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::connection::{ClientIdentity, Connection};
use crate::protocol::{CommandId, ServerMessage};
use crate::server::GatewayState;

pub(crate) use content::post_content;
pub(crate) use heavy::run as run_heavy;
pub(crate) use light::run as run_light;

/// Everything a command needs, shared by the connection task and its worker
pub struct AuthContext {
    state: GatewayState,
    connection: Arc<Connection>,
    identity: Arc<ClientIdentity>,
    /// Cleared when the connection leaves the authenticated stage
    active: AtomicBool,
}

impl AuthContext {
    pub fn new(
        state: GatewayState,
        connection: Arc<Connection>,
        identity: Arc<ClientIdentity>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            connection,
            identity,
            active: AtomicBool::new(true),
        })
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn services(&self) -> &ServiceContext {
        self.state.service_context()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn identity(&self) -> &Arc<ClientIdentity> {
        &self.identity
    }

    pub fn client_id(&self) -> ClientId {
        self.identity.client_id()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn reply(&self, message: &ServerMessage) {
        self.connection.send_message(message);
    }

    /// Send the outcome of a command back to the requester
    pub(crate) fn reply_result(&self, command: CommandId, result: Result<Vec<u8>, ServiceError>) {
        match result {
            Ok(body) => self.reply(&ServerMessage::command_ok(command, body)),
            Err(e) => {
                if e.is_client_error() {
                    debug!(client_id = %self.client_id(), command = command.name(), error = %e, "Command rejected");
                } else {
                    error!(client_id = %self.client_id(), command = command.name(), error = %e, "Command failed");
                }
                self.reply(&ServerMessage::command_failed(command, e.client_message()));
            }
        }
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("connection", &self.connection)
            .field("client_id", &self.client_id())
            .field("active", &self.is_active())
            .finish()
    }
}
