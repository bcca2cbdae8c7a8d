//! Account command tests
//!
//! Run with: cargo test -p integration-tests --test account_tests

use bytes::{Buf, Bytes};
use chat_gateway::protocol::{
    ClientMessage, Command, CommandId, EntryResultCode, EntryType, InlineLogin, ServerMessage,
};
use integration_tests::{same_ip, TestAccount, TestServer};
use std::collections::HashSet;

const NEW_PASSWORD: &str = "C0rrect-H0rse&Battery";

fn read_lp(body: &mut Bytes) -> Bytes {
    let len = body.get_u32() as usize;
    body.split_to(len)
}

#[tokio::test]
async fn test_change_password() {
    let server = TestServer::start();
    let (mut client, account, client_id) = server.signed_up().await;

    // The current password has to match
    client
        .send_command(Command::ChangePassword {
            current: "not-my-password".to_string(),
            new_password: NEW_PASSWORD.to_string(),
        })
        .await;
    let (success, _) = client.command_result(CommandId::ChangePassword).await;
    assert!(!success);

    client
        .send_command(Command::ChangePassword {
            current: account.password.clone(),
            new_password: "weak".to_string(),
        })
        .await;
    let (success, _) = client.command_result(CommandId::ChangePassword).await;
    assert!(!success);

    client
        .run_command(Command::ChangePassword {
            current: account.password.clone(),
            new_password: NEW_PASSWORD.to_string(),
        })
        .await;

    let mut stale = server.connect_from(same_ip(client.addr));
    stale
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::Login,
            inline: Some(InlineLogin {
                email: account.email.clone(),
                password: account.password.clone(),
            }),
        })
        .await;
    let (code, _) = stale.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::InvalidCredentials);

    let renewed = TestAccount {
        password: NEW_PASSWORD.to_string(),
        ..account
    };
    let mut fresh = server.connect_from(same_ip(client.addr));
    assert_eq!(fresh.login(&server, &renewed).await, client_id);
}

#[tokio::test]
async fn test_account_icon() {
    let server = TestServer::start();
    let (mut client, account, client_id) = server.signed_up().await;

    assert!(client.run_command(Command::FetchAccountIcon).await.is_empty());

    let icon = Bytes::from_static(b"\x89PNG\r\n\x1a\nicon-bytes");
    client.run_command(Command::SetAccountIcon(icon.clone())).await;
    assert_eq!(client.run_command(Command::FetchAccountIcon).await, icon);

    // Stored per account, not per connection
    let mut other = server.connect_from(same_ip(client.addr));
    assert_eq!(other.login(&server, &account).await, client_id);
    assert_eq!(other.run_command(Command::FetchAccountIcon).await, icon);
}

#[tokio::test]
async fn test_fetch_devices() {
    let server = TestServer::start();
    let (mut client, _, _) = server.signed_up().await;

    let mut body = client.run_command(Command::FetchDevices).await;
    let count = body.get_u32();
    assert!(count >= 1);

    let ips: Vec<String> = (0..count)
        .map(|_| {
            let ip = String::from_utf8(read_lp(&mut body).to_vec()).unwrap();
            assert!(body.get_i64() > 0);
            read_lp(&mut body);
            ip
        })
        .collect();
    assert!(body.is_empty());
    assert!(ips.contains(&client.addr.ip().to_string()), "{ips:?}");
}

#[tokio::test]
async fn test_regenerate_backup_codes() {
    let server = TestServer::start();
    let account = TestAccount::unique();
    let mut client = server.connect();
    let original = client.create_account_with_codes(&server, &account).await;

    client.send_command(Command::RegenerateBackupCodes).await;
    let (success, _) = client.command_result(CommandId::RegenerateBackupCodes).await;
    assert!(success);
    let ServerMessage::BackupCodes(codes) = client
        .recv_matching(|m| matches!(m, ServerMessage::BackupCodes(_)))
        .await
    else {
        unreachable!();
    };

    assert_eq!(codes.len(), original.len());
    let original: HashSet<_> = original.into_iter().collect();
    assert!(codes.iter().all(|code| !original.contains(code)));
}
