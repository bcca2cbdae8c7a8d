//! Heavy commands
//!
//! Each command persists first and only then updates the shared identities,
//! the session registry and other connections.

use bytes::{BufMut, Bytes};
use chat_core::{ChatSessionId, ClientId, MessageId};
use chat_service::{AccountService, ChatService, ServiceError, ServiceResult};
use std::sync::Arc;
use tracing::{debug, info};

use super::AuthContext;
use crate::connection::Connection;
use crate::protocol::wire::put_lp;
use crate::protocol::{prepare_payload, Command, ServerMessage};

/// Work left after the command result has been sent
enum Followup {
    None,
    BackupCodes(Vec<String>),
    /// Return these connections to Start
    Reset(Vec<Arc<Connection>>),
}

pub(crate) async fn run(ctx: &AuthContext, command: Command) {
    let id = command.id();
    if !id.is_heavy() {
        super::run_light(ctx, command).await;
        return;
    }
    debug!(client_id = %ctx.client_id(), command = id.name(), "Running command");

    match execute(ctx, command).await {
        Ok((body, followup)) => {
            ctx.reply_result(id, Ok(body));
            match followup {
                Followup::None => {}
                Followup::BackupCodes(codes) => ctx.reply(&ServerMessage::BackupCodes(codes)),
                Followup::Reset(connections) => {
                    // Nothing queued behind a logout runs on this connection
                    ctx.deactivate();
                    for connection in connections {
                        connection.reset();
                    }
                }
            }
        }
        Err(e) => ctx.reply_result(id, Err(e)),
    }
}

async fn execute(ctx: &AuthContext, command: Command) -> ServiceResult<(Vec<u8>, Followup)> {
    let me = ctx.client_id();
    let accounts = AccountService::new(ctx.services());
    let chats = ChatService::new(ctx.services());

    let body = match command {
        Command::ChangeUsername(username) => {
            accounts.change_username(me, &username).await?;
            ctx.identity().set_username(username.clone());
            username.into_bytes()
        }
        Command::ChangePassword {
            current,
            new_password,
        } => {
            accounts.change_password(me, &current, &new_password).await?;
            Vec::new()
        }
        Command::SendChatRequest(receiver) => {
            chats.send_chat_request(me, receiver).await?;
            if let Some(identity) = ctx.state().connection_manager().identity(receiver) {
                identity.add_chat_request(me);
                identity.send_all(&frame(ctx, &ServerMessage::ChatRequestReceived(me)));
            }
            client_id_body(receiver)
        }
        Command::AcceptChatRequest(sender) => {
            let session = chats.accept_chat_request(me, sender).await?;
            ctx.identity().remove_chat_request(sender);

            let manager = ctx.state().connection_manager();
            let registry = ctx.state().session_registry();
            let added = frame(
                ctx,
                &ServerMessage::ChatSessionAdded {
                    session_id: session.id,
                    members: session.members.clone(),
                },
            );
            for member in &session.members {
                let Some(identity) = manager.identity(*member) else {
                    continue;
                };
                identity.add_chat_session(&session);
                for connection in identity.connections() {
                    registry.activate(session.id, &connection);
                }
                identity.send_all(&added);
            }
            registry.announce_active_members(session.id);
            session_id_body(session.id)
        }
        Command::DeclineChatRequest(sender) => {
            chats.decline_chat_request(me, sender).await?;
            ctx.identity().remove_chat_request(sender);
            client_id_body(sender)
        }
        Command::DeleteChatSession(session_id) => {
            let members = chats.delete_chat_session(me, session_id).await?;

            let manager = ctx.state().connection_manager();
            let deleted = frame(ctx, &ServerMessage::ChatSessionDeleted(session_id));
            for member in members {
                if let Some(identity) = manager.identity(member) {
                    identity.remove_chat_session(session_id);
                    identity.send_all(&deleted);
                }
            }
            ctx.state().session_registry().evict(session_id);
            session_id_body(session_id)
        }
        Command::DeleteChatMessage {
            session_id,
            message_id,
        } => {
            chats.delete_message(me, session_id, message_id).await?;
            let deleted = frame(
                ctx,
                &ServerMessage::MessageDeleted {
                    session_id,
                    message_id,
                },
            );
            ctx.state()
                .session_registry()
                .broadcast(session_id, &deleted, None);
            message_body(session_id, message_id)
        }
        Command::SetAccountIcon(icon) => {
            accounts.set_icon(me, &icon).await?;
            Vec::new()
        }
        Command::FetchAccountIcon => accounts.icon(me).await?.unwrap_or_default(),
        Command::FetchMessages {
            session_id,
            offset,
            count,
        } => {
            let messages = chats.fetch_messages(me, session_id, offset, count).await?;
            let mut body = Vec::new();
            body.put_i32(session_id.into_inner());
            body.put_u32(messages.len() as u32);
            for message in &messages {
                body.put_i32(message.id.into_inner());
                body.put_i32(message.author_id.into_inner());
                body.put_i64(message.created_at.timestamp_millis());
                body.put_u32(message.content_type.as_u32());
                put_lp(&mut body, message.broadcast_body());
            }
            body
        }
        Command::DownloadFile {
            session_id,
            message_id,
        } => {
            let (name, bytes) = chats.download_file(me, session_id, message_id).await?;
            let mut body = message_body(session_id, message_id);
            put_lp(&mut body, name.as_bytes());
            body.extend_from_slice(&bytes);
            body
        }
        Command::FetchDevices => {
            let devices = accounts.devices(me).await?;
            let mut body = Vec::new();
            body.put_u32(devices.len() as u32);
            for device in &devices {
                put_lp(&mut body, device.ip.to_string().as_bytes());
                body.put_i64(device.logged_in_at.timestamp_millis());
                put_lp(&mut body, device.info.as_bytes());
            }
            body
        }
        Command::RegenerateBackupCodes => {
            let codes = accounts.regenerate_backup_codes(me).await?;
            return Ok((Vec::new(), Followup::BackupCodes(codes)));
        }
        Command::Logout => {
            let connection = ctx.connection();
            accounts.logout(me, connection.ip()).await?;
            info!(client_id = %me, conn_id = %connection.id(), "Logged out");
            return Ok((Vec::new(), Followup::Reset(vec![Arc::clone(connection)])));
        }
        Command::LogoutAllDevices => {
            let removed = accounts.logout_all_devices(me).await?;
            let connections = ctx.identity().connections();
            info!(client_id = %me, removed, connections = connections.len(), "Logged out everywhere");
            let mut body = Vec::with_capacity(8);
            body.put_u64(removed);
            return Ok((body, Followup::Reset(connections)));
        }
        Command::FetchUsername
        | Command::FetchClientId
        | Command::FetchChatRequests
        | Command::FetchChatSessions => {
            return Err(ServiceError::internal("light command on the heavy queue"));
        }
    };

    Ok((body, Followup::None))
}

/// Serialize and compress once for a fan-out
fn frame(ctx: &AuthContext, message: &ServerMessage) -> Bytes {
    prepare_payload(message.encode(), ctx.connection().compression_threshold())
}

fn client_id_body(client_id: ClientId) -> Vec<u8> {
    client_id.into_inner().to_be_bytes().to_vec()
}

fn session_id_body(session_id: ChatSessionId) -> Vec<u8> {
    session_id.into_inner().to_be_bytes().to_vec()
}

fn message_body(session_id: ChatSessionId, message_id: MessageId) -> Vec<u8> {
    let mut body = Vec::with_capacity(8);
    body.put_i32(session_id.into_inner());
    body.put_i32(message_id.into_inner());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bodies() {
        assert_eq!(client_id_body(ClientId::new(258)), vec![0, 0, 1, 2]);
        assert_eq!(session_id_body(ChatSessionId::new(-1)), vec![0xff; 4]);
        assert_eq!(
            message_body(ChatSessionId::new(1), MessageId::new(2)),
            vec![0, 0, 0, 1, 0, 0, 0, 2]
        );
    }
}
