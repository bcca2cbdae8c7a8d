//! Per-connection heavy-command queue
//!
//! One worker task per authenticated connection drains the queue, so heavy
//! commands from one connection never overlap and never reorder. Queues of
//! different connections run independently.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use super::AuthContext;
use crate::protocol::Command;

/// Handle to a connection's command worker
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl CommandQueue {
    /// Spawn the worker on the current runtime
    pub fn spawn(ctx: Arc<AuthContext>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let span = tracing::debug_span!(
            "command_worker",
            conn_id = %ctx.connection().id(),
            client_id = %ctx.client_id()
        );

        let worker = tokio::spawn(
            async move {
                while let Some(command) = rx.recv().await {
                    // Commands queued before a logout are not run afterwards
                    if !ctx.is_active() {
                        break;
                    }
                    super::run_heavy(&ctx, command).await;
                }
                debug!("Command worker stopped");
            }
            .instrument(span),
        );

        Self { tx, worker }
    }

    /// Queue a heavy command. Returns false once the worker has stopped.
    pub fn push(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
