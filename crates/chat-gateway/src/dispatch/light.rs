//! Light commands, answered from the cached client identity

use bytes::BufMut;

use super::AuthContext;
use crate::protocol::wire::put_i32_list;
use crate::protocol::{Command, CommandId, ServerMessage};

pub(crate) async fn run(ctx: &AuthContext, command: Command) {
    let id = command.id();
    debug_assert!(!id.is_heavy());
    let identity = ctx.identity();

    let body = match command {
        Command::FetchUsername => identity.username().into_bytes(),
        Command::FetchClientId => identity.client_id().into_inner().to_be_bytes().to_vec(),
        Command::FetchChatRequests => {
            let requests = identity.chat_requests();
            let mut body = Vec::with_capacity(4 + requests.len() * 4);
            put_i32_list(&mut body, requests.iter().map(|c| c.into_inner()));
            body
        }
        Command::FetchChatSessions => {
            let sessions = identity.chat_sessions();
            let mut body = Vec::new();
            body.put_u32(sessions.len() as u32);
            for session in &sessions {
                body.put_i32(session.id.into_inner());
                put_i32_list(&mut body, session.members.iter().map(|c| c.into_inner()));
            }
            ctx.reply(&ServerMessage::command_ok(CommandId::FetchChatSessions, body));

            // Make sure this connection receives every listed session
            let registry = ctx.state().session_registry();
            for session in &sessions {
                registry.activate(session.id, ctx.connection());
                registry.announce_active_members(session.id);
            }
            return;
        }
        other => {
            ctx.reply(&ServerMessage::command_failed(
                id,
                format!("{} is not a light command", other.id().name()),
            ));
            return;
        }
    };

    ctx.reply(&ServerMessage::command_ok(id, body));
}
