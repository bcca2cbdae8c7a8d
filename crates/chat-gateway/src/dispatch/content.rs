//! Chat content posted by an authenticated connection

use chat_core::ChatSessionId;
use chat_service::{ChatService, MessageBody};
use tracing::{debug, error};

use super::AuthContext;
use crate::protocol::{prepare_payload, ServerMessage};

/// Persist a message and fan it out to the session.
///
/// The payload is serialized and compressed once; every other active
/// connection gets the same buffer. The sender gets `MESSAGE_SENT` instead.
pub(crate) async fn post_content(ctx: &AuthContext, session_id: ChatSessionId, body: MessageBody) {
    let connection = ctx.connection();
    let result = ChatService::new(ctx.services())
        .post_message(ctx.client_id(), session_id, body)
        .await;

    let message = match result {
        Ok(message) => message,
        Err(e) => {
            if e.is_client_error() {
                debug!(client_id = %ctx.client_id(), session_id = %session_id, error = %e, "Content rejected");
            } else {
                error!(client_id = %ctx.client_id(), session_id = %session_id, error = %e, "Posting content failed");
            }
            ctx.reply(&ServerMessage::info(e.client_message()));
            return;
        }
    };

    let frame = prepare_payload(
        ServerMessage::content(&message).encode(),
        connection.compression_threshold(),
    );
    let delivered = ctx
        .state()
        .session_registry()
        .broadcast(session_id, &frame, Some(connection.id()));

    debug!(
        session_id = %session_id,
        message_id = %message.id,
        delivered,
        "Content broadcast"
    );
    ctx.reply(&ServerMessage::message_sent(&message));
}
