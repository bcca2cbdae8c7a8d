//! Entry and verification flow tests
//!
//! Run with: cargo test -p integration-tests --test entry_tests

use chat_gateway::protocol::{
    ClientMessage, Command, CommandId, CredentialKind, EntryAction, EntryResultCode, EntryType,
    InlineLogin, ServerMessage, VerificationAction,
};
use futures::future::join_all;
use integration_tests::{same_ip, TestAccount, TestServer};
use std::collections::HashSet;

#[tokio::test]
async fn test_create_account() {
    let server = TestServer::start();
    let (mut client, account, client_id) = server.signed_up().await;

    let username = client.run_command(Command::FetchUsername).await;
    assert_eq!(username, account.username.as_bytes());
    assert!(client_id.into_inner() > 0);
}

#[tokio::test]
async fn test_client_ids_are_unique() {
    let server = TestServer::start();

    let signups = (0..8).map(|_| server.signed_up());
    let ids: Vec<_> = join_all(signups)
        .await
        .into_iter()
        .map(|(_, _, id)| id)
        .collect();

    let distinct: HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), ids.len());
}

#[tokio::test]
async fn test_email_in_use() {
    let server = TestServer::start();
    let (_, account, _) = server.signed_up().await;

    let mut client = server.connect();
    client
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::CreateAccount,
            inline: None,
        })
        .await;
    client.send_credential(CredentialKind::Email, &account.email).await;
    client.send_credential(CredentialKind::Username, "someone_else").await;
    client.send_credential(CredentialKind::Password, &account.password).await;

    let (code, _) = client.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::EmailInUse);
}

#[tokio::test]
async fn test_weak_password_rejected() {
    let server = TestServer::start();
    let mut client = server.connect();
    let account = TestAccount::unique();

    client
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::CreateAccount,
            inline: None,
        })
        .await;
    client.send_credential(CredentialKind::Email, &account.email).await;
    client.send_credential(CredentialKind::Username, &account.username).await;
    client.send_credential(CredentialKind::Password, "password").await;

    let (code, _) = client.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::ValidationFailed);

    // Fixing the field completes the entry
    client.send_credential(CredentialKind::Password, &account.password).await;
    let (code, _) = client.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::VerificationRequired);
}

#[tokio::test]
async fn test_verification_attempts_exhausted() {
    let server = TestServer::start();
    let mut client = server.connect();
    let account = TestAccount::unique();
    client.recv().await;

    client
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::CreateAccount,
            inline: None,
        })
        .await;
    client.send_credential(CredentialKind::Email, &account.email).await;
    client.send_credential(CredentialKind::Username, &account.username).await;
    client.send_credential(CredentialKind::Password, &account.password).await;
    client.recv_entry_result().await;
    let code = server.notifier.wait_for_code(&account.email, 0).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for expected_left in [2, 1] {
        client
            .send(&ClientMessage::VerificationCode(wrong.to_string()))
            .await;
        let result = client.recv().await;
        assert!(matches!(
            result,
            ServerMessage::VerificationResult { success: false, attempts_left, .. }
                if attempts_left == expected_left
        ));
    }

    client
        .send(&ClientMessage::VerificationCode(wrong.to_string()))
        .await;
    assert!(matches!(
        client.recv().await,
        ServerMessage::VerificationResult {
            success: false,
            attempts_left: 0,
            ..
        }
    ));
    // Back at Start
    assert_eq!(client.recv().await, ServerMessage::IpVerified(false));

    // The right code is no longer accepted anywhere
    client.send(&ClientMessage::VerificationCode(code)).await;
    let info = client.recv_info().await;
    assert!(info.contains("START"), "{info}");
}

#[tokio::test]
async fn test_resend_keeps_code() {
    let server = TestServer::start();
    let mut client = server.connect();
    let account = TestAccount::unique();

    client
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::CreateAccount,
            inline: None,
        })
        .await;
    client.send_credential(CredentialKind::Email, &account.email).await;
    client.send_credential(CredentialKind::Username, &account.username).await;
    client.send_credential(CredentialKind::Password, &account.password).await;
    client.recv_entry_result().await;

    client
        .send(&ClientMessage::VerificationAction(VerificationAction::ResendCode))
        .await;
    assert_eq!(client.recv_info().await, "Verification code resent");

    let first = server.notifier.wait_for_code(&account.email, 0).await;
    let second = server.notifier.wait_for_code(&account.email, 1).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_known_device_skips_verification() {
    let server = TestServer::start();
    let (client, account, client_id) = server.signed_up().await;
    let addr = client.addr;
    drop(client);

    let mut again = server.connect_from(same_ip(addr));
    assert_eq!(again.recv().await, ServerMessage::IpVerified(true));

    let sent_before = server.notifier.codes_for(&account.email).len();
    again
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::Login,
            inline: Some(InlineLogin {
                email: account.email.clone(),
                password: account.password.clone(),
            }),
        })
        .await;
    let (code, _) = again.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::Success);
    assert_eq!(again.client_id().await, client_id);
    assert_eq!(server.notifier.codes_for(&account.email).len(), sent_before);
}

#[tokio::test]
async fn test_new_device_requires_verification() {
    let server = TestServer::start();
    let (_, account, client_id) = server.signed_up().await;

    let mut other = server.connect();
    assert_eq!(other.recv().await, ServerMessage::IpVerified(false));
    assert_eq!(other.login(&server, &account).await, client_id);
    assert_eq!(server.notifier.codes_for(&account.email).len(), 2);
}

#[tokio::test]
async fn test_wrong_password() {
    let server = TestServer::start();
    let (_, account, _) = server.signed_up().await;

    let mut client = server.connect();
    client
        .send(&ClientMessage::EntryType {
            entry_type: EntryType::Login,
            inline: Some(InlineLogin {
                email: account.email.clone(),
                password: "Wr0ng-Password!".to_string(),
            }),
        })
        .await;
    let (code, _) = client.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::InvalidCredentials);

    // Now in the entry stage with the email kept; the right password continues
    client
        .send_credential(CredentialKind::Password, &account.password)
        .await;
    let (code, _) = client.recv_entry_result().await;
    assert_eq!(code, EntryResultCode::VerificationRequired);
}

#[tokio::test]
async fn test_backup_code_login_is_single_use() {
    let server = TestServer::start();
    let account = TestAccount::unique();
    let mut first = server.connect();
    let codes = first.create_account_with_codes(&server, &account).await;
    assert_eq!(codes.len(), 10);

    let backup_login = |code: String| {
        let mut client = server.connect();
        let email = account.email.clone();
        async move {
            client
                .send(&ClientMessage::EntryType {
                    entry_type: EntryType::Login,
                    inline: None,
                })
                .await;
            client
                .send(&ClientMessage::EntryAction(EntryAction::SetBackupCodeMode(true)))
                .await;
            client.send_credential(CredentialKind::Email, &email).await;
            client.send_credential(CredentialKind::BackupCode, &code).await;
            client.recv_entry_result().await.0
        }
    };

    assert_eq!(backup_login(codes[0].clone()).await, EntryResultCode::Success);
    assert_eq!(
        backup_login(codes[0].clone()).await,
        EntryResultCode::InvalidCredentials
    );
}

#[tokio::test]
async fn test_logout_returns_to_start() {
    let server = TestServer::start();
    let (mut client, _, _) = server.signed_up().await;

    client.send_command(Command::Logout).await;
    let (success, _) = client.command_result(CommandId::Logout).await;
    assert!(success);
    assert_eq!(
        client
            .recv_matching(|m| matches!(m, ServerMessage::IpVerified(_)))
            .await,
        ServerMessage::IpVerified(false)
    );

    client.send_command(Command::FetchClientId).await;
    let info = client.recv_info().await;
    assert!(info.contains("START"), "{info}");
}
