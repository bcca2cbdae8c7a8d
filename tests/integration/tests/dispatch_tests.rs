//! Command dispatch and fan-out tests
//!
//! Run with: cargo test -p integration-tests --test dispatch_tests

use bytes::{Buf, Bytes};
use chat_common::RateLimitConfig;
use chat_core::{ChatSessionId, ChatSessionRepository, ClientId};
use chat_gateway::protocol::{ClientMessage, Command, CommandId, ServerMessage};
use integration_tests::{open_chat_session, same_ip, test_config, TestClient, TestServer};
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(200);

fn read_ids(body: &mut Bytes) -> Vec<i32> {
    let n = body.get_u32();
    (0..n).map(|_| body.get_i32()).collect()
}

/// FETCH_CHAT_SESSIONS body as (session, sorted members) pairs
fn parse_sessions(mut body: Bytes) -> Vec<(ChatSessionId, Vec<ClientId>)> {
    let n = body.get_u32();
    let sessions = (0..n)
        .map(|_| {
            let id = ChatSessionId::new(body.get_i32());
            let mut members: Vec<ClientId> =
                read_ids(&mut body).into_iter().map(ClientId::new).collect();
            members.sort_unstable();
            (id, members)
        })
        .collect();
    assert!(body.is_empty(), "trailing bytes in session list");
    sessions
}

async fn active_members(client: &mut TestClient) -> (ChatSessionId, Vec<ClientId>) {
    match client
        .recv_matching(|m| matches!(m, ServerMessage::ActiveMembers { .. }))
        .await
    {
        ServerMessage::ActiveMembers { session_id, clients } => (session_id, clients),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_content_fan_out() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    a.send_text(session_id, "hello").await;

    let sent = a
        .recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
        .await;
    let ServerMessage::MessageSent { message_id, .. } = sent else {
        unreachable!();
    };
    let content = b
        .recv_matching(|m| matches!(m, ServerMessage::Content { .. }))
        .await;
    let ServerMessage::Content {
        session_id: got_session,
        message_id: got_id,
        author,
        body,
        ..
    } = content
    else {
        unreachable!();
    };
    assert_eq!(got_session, session_id);
    assert_eq!(got_id, message_id);
    assert_eq!(author, a_id);
    assert_eq!(body, &b"hello"[..]);

    // The sender never gets its own content back
    a.assert_silent(QUIET).await;
}

#[tokio::test]
async fn test_message_ids_increase() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        a.send_text(session_id, &format!("message {i}")).await;
        let ServerMessage::MessageSent { message_id, .. } = a
            .recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
            .await
        else {
            unreachable!();
        };
        ids.push(message_id);
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");
    assert_eq!(server.store.message_count(session_id), 5);
}

#[tokio::test]
async fn test_content_for_foreign_session_rejected() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let (mut c, _, _) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    c.send_text(session_id, "intruder").await;
    let info = c.recv_info().await;
    assert!(!info.is_empty());
    assert_eq!(server.store.message_count(session_id), 0);
}

#[tokio::test]
async fn test_heavy_commands_keep_order() {
    let server = TestServer::start();
    let (mut client, _, _) = server.signed_up().await;

    let names: Vec<String> = (0..6).map(|i| format!("renamed_{i}")).collect();
    for name in &names {
        client
            .send_command(Command::ChangeUsername(name.clone()))
            .await;
    }

    for name in &names {
        let (success, body) = client.command_result(CommandId::ChangeUsername).await;
        assert!(success);
        assert_eq!(body, name.as_bytes());
    }
    let username = client.run_command(Command::FetchUsername).await;
    assert_eq!(username, names[5].as_bytes());
}

#[tokio::test]
async fn test_delete_session_reaches_every_device() {
    let server = TestServer::start();
    let (mut a, account_a, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    // Second device for a, same address so no verification round trip
    let mut a2 = server.connect_from(same_ip(a.addr));
    assert_eq!(a2.login(&server, &account_a).await, a_id);

    b.send_command(Command::DeleteChatSession(session_id)).await;
    let (success, _) = b.command_result(CommandId::DeleteChatSession).await;
    assert!(success);

    for client in [&mut a, &mut a2, &mut b] {
        assert_eq!(
            client
                .recv_matching(|m| matches!(m, ServerMessage::ChatSessionDeleted(_)))
                .await,
            ServerMessage::ChatSessionDeleted(session_id)
        );
    }
    assert!(server
        .state
        .session_registry()
        .active_clients(session_id)
        .is_empty());

    // Content to the deleted session now fails
    a.send_text(session_id, "anyone?").await;
    assert!(!a.recv_info().await.is_empty());
}

#[tokio::test]
async fn test_delete_message_broadcasts_to_requester() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    a.send_text(session_id, "oops").await;
    let ServerMessage::MessageSent { message_id, .. } = a
        .recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
        .await
    else {
        unreachable!();
    };

    // Only the author may delete
    b.send_command(Command::DeleteChatMessage {
        session_id,
        message_id,
    })
    .await;
    let (success, _) = b.command_result(CommandId::DeleteChatMessage).await;
    assert!(!success);

    a.send_command(Command::DeleteChatMessage {
        session_id,
        message_id,
    })
    .await;
    let deleted = ServerMessage::MessageDeleted {
        session_id,
        message_id,
    };
    for client in [&mut a, &mut b] {
        assert_eq!(
            client
                .recv_matching(|m| matches!(m, ServerMessage::MessageDeleted { .. }))
                .await,
            deleted
        );
    }
    let (success, _) = a.command_result(CommandId::DeleteChatMessage).await;
    assert!(success);
}

#[tokio::test]
async fn test_fetch_messages_and_download_file() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    a.send_text(session_id, "first").await;
    a.recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
        .await;
    a.send(&ClientMessage::Content {
        session_id,
        body: chat_service::MessageBody::File {
            name: "notes.txt".to_string(),
            bytes: b"file contents".to_vec(),
        },
    })
    .await;
    let ServerMessage::MessageSent {
        message_id: file_id,
        ..
    } = a
        .recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
        .await
    else {
        unreachable!();
    };

    // File content is broadcast by name
    let ServerMessage::Content { body, .. } = b
        .recv_matching(|m| matches!(m, ServerMessage::Content { body, .. } if body[..] == b"notes.txt"[..]))
        .await
    else {
        unreachable!();
    };
    assert_eq!(body, &b"notes.txt"[..]);

    let page = b
        .run_command(Command::FetchMessages {
            session_id,
            offset: 0,
            count: 10,
        })
        .await;
    // i32 session, u32 count
    assert_eq!(&page[..4], &session_id.into_inner().to_be_bytes());
    assert_eq!(&page[4..8], &2u32.to_be_bytes());

    let file = b
        .run_command(Command::DownloadFile {
            session_id,
            message_id: file_id,
        })
        .await;
    assert!(file.ends_with(b"file contents"));
}

#[tokio::test]
async fn test_logout_all_devices() {
    let server = TestServer::start();
    let (mut a, account, a_id) = server.signed_up().await;
    let mut a2 = server.connect_from(same_ip(a.addr));
    assert_eq!(a2.login(&server, &account).await, a_id);

    a.send_command(Command::LogoutAllDevices).await;
    let (success, _) = a.command_result(CommandId::LogoutAllDevices).await;
    assert!(success);

    for client in [&mut a, &mut a2] {
        assert_eq!(
            client
                .recv_matching(|m| matches!(m, ServerMessage::IpVerified(_)))
                .await,
            ServerMessage::IpVerified(false)
        );
    }
    assert!(server.state.connection_manager().identity(a_id).is_none());
}

#[tokio::test]
async fn test_rate_limit_bans_then_recovers() {
    let server = TestServer::start_with(chat_common::AppConfig {
        rate_limit: RateLimitConfig {
            requests_per_second: 5,
            ban_seconds: 1,
        },
        ..test_config()
    });
    let mut client = server.connect();
    assert_eq!(client.recv().await, ServerMessage::IpVerified(false));

    for _ in 0..5 {
        client.send_command(Command::FetchClientId).await;
    }
    for _ in 0..5 {
        assert!(client.recv_info().await.contains("START"));
    }

    client.send_command(Command::FetchClientId).await;
    assert!(client.recv_info().await.contains("Too many requests"));

    // Dropped without a reply while banned
    client.send_command(Command::FetchClientId).await;
    client.assert_silent(QUIET).await;

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    client.send_command(Command::FetchClientId).await;
    assert!(client.recv_info().await.contains("START"));
}

#[tokio::test]
async fn test_accepted_request_becomes_session() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;

    a.run_command(Command::SendChatRequest(b_id)).await;
    b.recv_matching(|m| matches!(m, ServerMessage::ChatRequestReceived(_)))
        .await;
    let mut pending = b.run_command(Command::FetchChatRequests).await;
    assert_eq!(read_ids(&mut pending), vec![a_id.into_inner()]);

    let body = b.run_command(Command::AcceptChatRequest(a_id)).await;
    let session_id = ChatSessionId::new(i32::from_be_bytes(body[..4].try_into().unwrap()));

    let mut pending = b.run_command(Command::FetchChatRequests).await;
    assert!(read_ids(&mut pending).is_empty());
    assert!(server.store.chat_requests_of(b_id).await.unwrap().is_empty());

    let mut both = vec![a_id, b_id];
    both.sort_unstable();
    for client in [&mut a, &mut b] {
        let sessions = parse_sessions(client.run_command(Command::FetchChatSessions).await);
        assert_eq!(sessions, vec![(session_id, both.clone())]);
    }

    let stored = server.store.chat_sessions_of(a_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, session_id);
    assert!(stored[0].members.contains(&a_id) && stored[0].members.contains(&b_id));
    assert_eq!(server.store.chat_sessions_of(b_id).await.unwrap(), stored);
}

#[tokio::test]
async fn test_fetch_chat_sessions_announces_to_peer() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;
    let mut both = vec![a_id, b_id];
    both.sort_unstable();

    // Also drains the announcement a got when the session opened
    for client in [&mut a, &mut b] {
        let mut pending = client.run_command(Command::FetchChatRequests).await;
        assert!(read_ids(&mut pending).is_empty());
    }
    a.assert_silent(QUIET).await;
    b.assert_silent(QUIET).await;

    // Each fetch announces to both members, the fetching side after its result
    a.run_command(Command::FetchChatSessions).await;
    assert_eq!(active_members(&mut a).await, (session_id, both.clone()));
    assert_eq!(active_members(&mut b).await, (session_id, both.clone()));
    b.assert_silent(QUIET).await;

    b.run_command(Command::FetchChatSessions).await;
    assert_eq!(active_members(&mut a).await, (session_id, both.clone()));
    a.assert_silent(QUIET).await;

    assert_eq!(server.state.session_registry().active_clients(session_id), both);
}

#[tokio::test]
async fn test_fetch_chat_sessions_on_new_device() {
    let server = TestServer::start();
    let (mut a, account_a, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;
    b.assert_silent(QUIET).await;

    let mut a2 = server.connect_from(same_ip(a.addr));
    assert_eq!(a2.login(&server, &account_a).await, a_id);
    // Logging in activates the device in its sessions
    assert_eq!(active_members(&mut b).await.0, session_id);

    let sessions = parse_sessions(a2.run_command(Command::FetchChatSessions).await);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].0, session_id);

    let (announced, clients) = active_members(&mut b).await;
    assert_eq!(announced, session_id);
    assert!(clients.contains(&a_id) && clients.contains(&b_id));

    b.send_text(session_id, "to every device").await;
    for client in [&mut a, &mut a2] {
        let ServerMessage::Content { author, body, .. } = client
            .recv_matching(|m| matches!(m, ServerMessage::Content { .. }))
            .await
        else {
            unreachable!();
        };
        assert_eq!(author, b_id);
        assert_eq!(body, &b"to every device"[..]);
    }
}

#[tokio::test]
async fn test_decline_chat_request() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;

    a.run_command(Command::SendChatRequest(b_id)).await;
    b.recv_matching(|m| matches!(m, ServerMessage::ChatRequestReceived(_)))
        .await;

    let body = b.run_command(Command::DeclineChatRequest(a_id)).await;
    assert_eq!(&body[..], &a_id.into_inner().to_be_bytes());

    let mut pending = b.run_command(Command::FetchChatRequests).await;
    assert!(read_ids(&mut pending).is_empty());
    assert!(server.store.chat_requests_of(b_id).await.unwrap().is_empty());
    assert!(parse_sessions(b.run_command(Command::FetchChatSessions).await).is_empty());
    assert_eq!(server.store.session_count(), 0);

    // Nothing left to decline or accept
    b.send_command(Command::DeclineChatRequest(a_id)).await;
    let (success, _) = b.command_result(CommandId::DeclineChatRequest).await;
    assert!(!success);
    b.send_command(Command::AcceptChatRequest(a_id)).await;
    let (success, _) = b.command_result(CommandId::AcceptChatRequest).await;
    assert!(!success);
    a.assert_silent(QUIET).await;
}
