//! Test helpers for integration tests
//!
//! [`TestServer`] owns a gateway state; [`TestClient`] speaks the framed
//! protocol to one connection task over an in-memory stream.

use async_trait::async_trait;
use bytes::Bytes;
use chat_common::AppConfig;
use chat_core::{ChatSessionId, ClientId, DomainError, VerificationNotifier};
use chat_db::MemoryStore;
use chat_gateway::protocol::{
    ClientMessage, Command, CommandId, CredentialKind, EntryResultCode, EntryType, FrameCodec,
    InlineLogin, ServerMessage,
};
use chat_gateway::{handle_connection, GatewayState};
use chat_service::{MessageBody, ServiceContextBuilder};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::Notify;
use tokio_util::codec::Framed;

use crate::fixtures::{test_config, unique_addr, TestAccount};

/// How long a test waits for an expected message
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest frame a test client accepts
const CLIENT_MAX_FRAME: usize = 64 * 1024 * 1024;

const DUPLEX_BUFFER: usize = 1024 * 1024;

/// Notifier that keeps every code it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    notify: Notify,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Codes sent to `email`, oldest first
    pub fn codes_for(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
            .collect()
    }

    /// Wait until code number `index` (zero-based) for `email` arrives
    pub async fn wait_for_code(&self, email: &str, index: usize) -> String {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                let notified = self.notify.notified();
                if let Some(code) = self.codes_for(email).get(index) {
                    return code.clone();
                }
                notified.await;
            }
        })
        .await
        .expect("verification code was never sent")
    }
}

#[async_trait]
impl VerificationNotifier for RecordingNotifier {
    async fn send_verification_email(&self, email: &str, code: &str) -> Result<(), DomainError> {
        self.sent.lock().push((email.to_string(), code.to_string()));
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Test server wrapper
pub struct TestServer {
    pub state: GatewayState,
    pub store: MemoryStore,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestServer {
    /// Start a server with [`test_config`]
    pub fn start() -> Self {
        Self::start_with(test_config())
    }

    /// Start a server with custom configuration. Must run inside a runtime.
    pub fn start_with(config: AppConfig) -> Self {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        let service_context = ServiceContextBuilder::new()
            .store(store.clone())
            .notifier(notifier.clone())
            .verification(config.verification.clone())
            .id_pools(config.id_pool.clone())
            .build()
            .expect("Failed to build service context");

        Self {
            state: GatewayState::new(service_context, config),
            store,
            notifier,
        }
    }

    /// Open a connection from a fresh address
    pub fn connect(&self) -> TestClient {
        self.connect_from(unique_addr())
    }

    /// Open a connection from `addr`
    pub fn connect_from(&self, addr: SocketAddr) -> TestClient {
        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER);
        tokio::spawn(handle_connection(self.state.clone(), server, addr));
        TestClient {
            framed: Framed::new(client, FrameCodec::new(CLIENT_MAX_FRAME)),
            addr,
        }
    }

    /// Create an account on a new connection and leave it authenticated
    pub async fn signed_up(&self) -> (TestClient, TestAccount, ClientId) {
        let account = TestAccount::unique();
        let mut client = self.connect();
        let client_id = client.create_account(self, &account).await;
        (client, account, client_id)
    }
}

/// One framed connection to the server
pub struct TestClient {
    framed: Framed<DuplexStream, FrameCodec>,
    pub addr: SocketAddr,
}

impl TestClient {
    pub async fn send(&mut self, message: &ClientMessage) {
        self.send_raw(message.encode()).await;
    }

    /// Frame and send an arbitrary payload
    pub async fn send_raw(&mut self, payload: Bytes) {
        self.framed.send(payload).await.expect("Failed to send frame");
    }

    pub async fn send_command(&mut self, command: Command) {
        self.send(&ClientMessage::Command(command)).await;
    }

    pub async fn send_text(&mut self, session_id: ChatSessionId, text: &str) {
        self.send(&ClientMessage::Content {
            session_id,
            body: MessageBody::Text(text.as_bytes().to_vec()),
        })
        .await;
    }

    /// Next message from the server
    pub async fn recv(&mut self) -> ServerMessage {
        let frame = tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Connection closed")
            .expect("Read failed")
            .expect("Invalid frame");
        ServerMessage::decode(frame).expect("Undecodable server message")
    }

    /// Skip messages until one matches
    pub async fn recv_matching(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let message = self.recv().await;
            if pred(&message) {
                return message;
            }
        }
    }

    pub async fn recv_info(&mut self) -> String {
        match self
            .recv_matching(|m| matches!(m, ServerMessage::ServerInfo(_)))
            .await
        {
            ServerMessage::ServerInfo(text) => text,
            _ => unreachable!(),
        }
    }

    pub async fn recv_entry_result(&mut self) -> (EntryResultCode, String) {
        match self
            .recv_matching(|m| matches!(m, ServerMessage::EntryResult { .. }))
            .await
        {
            ServerMessage::EntryResult { code, message } => (code, message),
            _ => unreachable!(),
        }
    }

    /// Result of the next `id` command: success flag and body
    pub async fn command_result(&mut self, id: CommandId) -> (bool, Bytes) {
        match self
            .recv_matching(|m| matches!(m, ServerMessage::CommandResult { command, .. } if *command == id))
            .await
        {
            ServerMessage::CommandResult { success, body, .. } => (success, body),
            _ => unreachable!(),
        }
    }

    /// Run a command and expect it to succeed
    pub async fn run_command(&mut self, command: Command) -> Bytes {
        let id = command.id();
        self.send_command(command).await;
        let (success, body) = self.command_result(id).await;
        assert!(success, "{id} failed: {}", String::from_utf8_lossy(&body));
        body
    }

    pub async fn client_id(&mut self) -> ClientId {
        let body = self.run_command(Command::FetchClientId).await;
        ClientId::new(i32::from_be_bytes(body[..4].try_into().expect("short client id")))
    }

    /// Assert nothing arrives for `wait`
    pub async fn assert_silent(&mut self, wait: Duration) {
        if let Ok(frame) = tokio::time::timeout(wait, self.framed.next()).await {
            let message = frame
                .and_then(Result::ok)
                .and_then(Result::ok)
                .map(ServerMessage::decode);
            panic!("Expected silence, got {message:?}");
        }
    }

    pub async fn send_credential(&mut self, kind: CredentialKind, value: &str) {
        self.send(&ClientMessage::Credential {
            kind,
            value: value.to_string(),
        })
        .await;
    }

    /// Full create-account flow; returns the new client ID
    pub async fn create_account(&mut self, server: &TestServer, account: &TestAccount) -> ClientId {
        self.create_account_with_codes(server, account).await;
        self.client_id().await
    }

    /// Create an account and return the backup codes it was issued
    pub async fn create_account_with_codes(
        &mut self,
        server: &TestServer,
        account: &TestAccount,
    ) -> Vec<String> {
        let sent_before = server.notifier.codes_for(&account.email).len();

        self.send(&ClientMessage::EntryType {
            entry_type: EntryType::CreateAccount,
            inline: None,
        })
        .await;
        self.send_credential(CredentialKind::Email, &account.email).await;
        self.send_credential(CredentialKind::Username, &account.username).await;
        self.send_credential(CredentialKind::Password, &account.password).await;

        let (code, message) = self.recv_entry_result().await;
        assert_eq!(code, EntryResultCode::VerificationRequired, "{message}");

        let code = server.notifier.wait_for_code(&account.email, sent_before).await;
        self.send(&ClientMessage::VerificationCode(code)).await;
        let ServerMessage::BackupCodes(codes) = self
            .recv_matching(|m| matches!(m, ServerMessage::BackupCodes(_)))
            .await
        else {
            unreachable!();
        };
        self.expect_verified().await;
        codes
    }

    /// Log in with inline credentials, answering a verification request if one comes
    pub async fn login(&mut self, server: &TestServer, account: &TestAccount) -> ClientId {
        let sent_before = server.notifier.codes_for(&account.email).len();
        self.send(&ClientMessage::EntryType {
            entry_type: EntryType::Login,
            inline: Some(InlineLogin {
                email: account.email.clone(),
                password: account.password.clone(),
            }),
        })
        .await;

        match self.recv_entry_result().await {
            (EntryResultCode::Success, _) => {}
            (EntryResultCode::VerificationRequired, _) => {
                let code = server.notifier.wait_for_code(&account.email, sent_before).await;
                self.send(&ClientMessage::VerificationCode(code)).await;
                self.expect_verified().await;
            }
            (code, message) => panic!("Login failed with {code:?}: {message}"),
        }
        self.client_id().await
    }

    async fn expect_verified(&mut self) {
        match self
            .recv_matching(|m| matches!(m, ServerMessage::VerificationResult { .. }))
            .await
        {
            ServerMessage::VerificationResult {
                success, message, ..
            } => assert!(success, "Verification failed: {message}"),
            _ => unreachable!(),
        }
    }
}

/// Turn a chat request from `a` to `b` into a session; returns its ID
pub async fn open_chat_session(
    a: &mut TestClient,
    a_id: ClientId,
    b: &mut TestClient,
    b_id: ClientId,
) -> ChatSessionId {
    a.run_command(Command::SendChatRequest(b_id)).await;
    let received = b
        .recv_matching(|m| matches!(m, ServerMessage::ChatRequestReceived(_)))
        .await;
    assert_eq!(received, ServerMessage::ChatRequestReceived(a_id));

    // The acceptor hears about the session before its command result
    b.send_command(Command::AcceptChatRequest(a_id)).await;
    let b_added = b
        .recv_matching(|m| matches!(m, ServerMessage::ChatSessionAdded { .. }))
        .await;
    let (success, body) = b.command_result(CommandId::AcceptChatRequest).await;
    assert!(success, "accept failed: {}", String::from_utf8_lossy(&body));
    let session_id = ChatSessionId::new(i32::from_be_bytes(
        body[..4].try_into().expect("short session id"),
    ));

    let a_added = a
        .recv_matching(|m| matches!(m, ServerMessage::ChatSessionAdded { .. }))
        .await;
    for added in [a_added, b_added] {
        let ServerMessage::ChatSessionAdded { session_id: id, members } = added else {
            unreachable!();
        };
        assert_eq!(id, session_id);
        assert!(members.contains(&a_id) && members.contains(&b_id));
    }
    session_id
}
