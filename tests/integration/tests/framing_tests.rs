//! Framing and transport tests
//!
//! Run with: cargo test -p integration-tests --test framing_tests

use bytes::{BufMut, Bytes, BytesMut};
use chat_gateway::protocol::{ClientMessage, Command, ServerMessage, ZSTD_MAGIC};
use chat_service::MessageBody;
use integration_tests::{open_chat_session, TestServer};
use std::time::Duration;

#[tokio::test]
async fn test_ip_verified_on_connect() {
    let server = TestServer::start();
    let mut client = server.connect();

    assert_eq!(client.recv().await, ServerMessage::IpVerified(false));
}

#[tokio::test]
async fn test_oversize_frame_before_login_keeps_connection() {
    let server = TestServer::start();
    let mut client = server.connect();
    client.recv().await;

    // 9 KiB of filler behind a valid tag is over the 8 KiB pre-login limit
    let mut payload = BytesMut::new();
    payload.put_u32(1);
    payload.put_bytes(0, 9 * 1024);
    client.send_raw(payload.freeze()).await;

    let info = client.recv_info().await;
    assert!(info.contains("exceeds"), "{info}");

    // The stream is still in sync
    client
        .send(&ClientMessage::Command(Command::FetchUsername))
        .await;
    let info = client.recv_info().await;
    assert!(info.contains("START"), "{info}");
}

#[tokio::test]
async fn test_compressed_inbound_frame() {
    let server = TestServer::start();
    let mut client = server.connect();
    client.recv().await;

    let plain = ClientMessage::Command(Command::FetchClientId).encode();
    let compressed = zstd::bulk::compress(&plain, 3).unwrap();
    assert!(compressed.starts_with(&ZSTD_MAGIC));
    client.send_raw(Bytes::from(compressed)).await;

    let info = client.recv_info().await;
    assert!(info.contains("COMMAND"), "{info}");
}

#[tokio::test]
async fn test_garbage_frame_reports_and_continues() {
    let server = TestServer::start();
    let mut client = server.connect();
    client.recv().await;

    client.send_raw(Bytes::from_static(&[0, 0, 0, 99])).await;
    let info = client.recv_info().await;
    assert!(info.contains("99"), "{info}");

    client.send_raw(Bytes::from_static(&[0, 0])).await;
    let info = client.recv_info().await;
    assert!(info.contains("truncated"), "{info}");
}

#[tokio::test]
async fn test_large_content_is_compressed_once_and_delivered() {
    let server = TestServer::start();
    let (mut a, _, a_id) = server.signed_up().await;
    let (mut b, _, b_id) = server.signed_up().await;
    let session_id = open_chat_session(&mut a, a_id, &mut b, b_id).await;

    let text = "chat ".repeat(100_000);
    a.send(&ClientMessage::Content {
        session_id,
        body: MessageBody::Text(text.clone().into_bytes()),
    })
    .await;

    let content = b
        .recv_matching(|m| matches!(m, ServerMessage::Content { .. }))
        .await;
    let ServerMessage::Content { body, author, .. } = content else {
        unreachable!();
    };
    assert_eq!(author, a_id);
    assert_eq!(body, text.as_bytes());

    a.recv_matching(|m| matches!(m, ServerMessage::MessageSent { .. }))
        .await;
    a.assert_silent(Duration::from_millis(200)).await;
}
