//! Connection task
//!
//! One task per connection reads frames, drives the stage machine and owns
//! the single writer. Everything else reaches the peer by queueing on the
//! connection's outbound channel.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use crate::connection::{AbuseGuard, Connection, Outbound, Verdict};
use crate::error::HandlerError;
use crate::protocol::{ClientMessage, FrameCodec, FrameError, ServerMessage};
use crate::server::GatewayState;
use crate::stages::StageMachine;

/// Serve one connection until the peer goes away
#[instrument(skip_all, fields(peer = %addr))]
pub async fn handle_connection<S>(state: GatewayState, stream: S, addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = state.config();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let connection = Connection::new(addr, tx, config.limits.compression_threshold);
    let conn_id = connection.id();
    state.connection_manager().add_connection(connection.clone());
    info!(conn_id = %conn_id, "Connection established");

    let mut framed = Framed::new(
        stream,
        FrameCodec::new(config.limits.unauthenticated_frame_bytes),
    );
    let mut guard = AbuseGuard::new(&config.rate_limit);
    let ban_seconds = config.rate_limit.ban_seconds;
    let mut machine = StageMachine::new(state.clone(), connection.clone());
    machine.on_connect().await;

    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(frame)) => {
                    match guard.check(Instant::now()) {
                        Verdict::Allow => {}
                        Verdict::Dropped => continue,
                        Verdict::Banned => {
                            warn!(conn_id = %conn_id, "Rate limit exceeded, connection banned");
                            connection.send_message(&ServerMessage::info(format!(
                                "Too many requests, messages are ignored for {ban_seconds} seconds"
                            )));
                            continue;
                        }
                    }
                    handle_frame(&mut machine, frame).await;
                    framed.codec_mut().set_max_frame_len(machine.max_frame_len());
                }
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "Read failed");
                    break;
                }
                None => {
                    debug!(conn_id = %conn_id, "Peer closed the connection");
                    break;
                }
            },
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(payload)) => {
                    if let Err(e) = framed.send(payload).await {
                        debug!(conn_id = %conn_id, error = %e, "Write failed");
                        break;
                    }
                }
                Some(Outbound::Reset) => {
                    machine.reset().await;
                    framed.codec_mut().set_max_frame_len(machine.max_frame_len());
                }
                // The connection holds a sender, so the channel never closes first
                None => break,
            },
        }
    }

    machine.shutdown();
    state.connection_manager().remove_connection(conn_id);
    info!(conn_id = %conn_id, age_ms = connection.age().as_millis() as u64, "Connection closed");
}

async fn handle_frame(machine: &mut StageMachine, frame: Result<Bytes, FrameError>) {
    let message = frame
        .map_err(HandlerError::from)
        .and_then(|payload| ClientMessage::decode(payload).map_err(HandlerError::from));

    match message {
        Ok(message) => machine.handle(message).await,
        Err(e) => machine.report(&e),
    }
}
