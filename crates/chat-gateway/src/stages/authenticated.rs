//! Authenticated stage: content and commands

use std::sync::Arc;
use tracing::debug;

use super::StageResult;
use crate::dispatch::{self, AuthContext, CommandQueue};
use crate::error::HandlerError;
use crate::protocol::ClientMessage;

/// A logged-in connection with its command worker
#[derive(Debug)]
pub struct AuthenticatedState {
    ctx: Arc<AuthContext>,
    queue: CommandQueue,
}

impl AuthenticatedState {
    pub fn new(ctx: Arc<AuthContext>) -> Self {
        let queue = CommandQueue::spawn(Arc::clone(&ctx));
        Self { ctx, queue }
    }

    pub fn context(&self) -> &Arc<AuthContext> {
        &self.ctx
    }

    /// Activate the connection in each of the client's chat sessions
    pub(super) fn open(&self) {
        let registry = self.ctx.state().session_registry();
        let connection = self.ctx.connection();
        connection.open_chat_sessions();
        for session_id in self.ctx.identity().chat_session_ids() {
            if registry.activate(session_id, connection) {
                registry.announce_active_members(session_id);
            }
        }
    }

    /// Stop the worker and remove the connection from shared state
    pub(super) fn close(self) {
        let Self { ctx, queue } = self;
        ctx.deactivate();
        drop(queue);

        // Detach first so no other worker finds this connection through the identity
        let connection = ctx.connection();
        ctx.state().connection_manager().detach(connection);

        let registry = ctx.state().session_registry();
        for session_id in registry.release(connection) {
            registry.announce_active_members(session_id);
        }
        debug!(conn_id = %connection.id(), client_id = %ctx.client_id(), "Left authenticated stage");
    }

    pub(super) async fn handle(&mut self, message: ClientMessage) -> StageResult {
        match message {
            ClientMessage::Content { session_id, body } => {
                dispatch::post_content(&self.ctx, session_id, body).await;
            }
            ClientMessage::Command(command) if command.is_heavy() => {
                let id = command.id();
                if !self.queue.push(command) {
                    debug!(conn_id = %self.ctx.connection().id(), command = id.name(), "Command worker gone, command dropped");
                }
            }
            ClientMessage::Command(command) => dispatch::run_light(&self.ctx, command).await,
            other => return Err(HandlerError::unexpected("AUTHENTICATED", other.name())),
        }
        Ok(None)
    }
}
