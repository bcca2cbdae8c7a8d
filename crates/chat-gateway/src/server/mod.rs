//! Gateway server setup
//!
//! Builds the shared state, binds the TLS listener and spawns one task per
//! accepted connection.

mod handler;
mod state;
mod tls;

pub use handler::handle_connection;
pub use state::GatewayState;
pub use tls::load_tls_acceptor;

use chat_common::{AppConfig, AppError, StorageBackend};
use chat_service::{LogNotifier, ServiceContextBuilder};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Pause after a failed accept, so descriptor exhaustion does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Initialize storage and services and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let builder = ServiceContextBuilder::new()
        .notifier(Arc::new(LogNotifier))
        .verification(config.verification.clone())
        .id_pools(config.id_pool.clone());

    let builder = match &config.storage {
        StorageBackend::Postgres(db) => {
            info!("Connecting to PostgreSQL...");
            let pool = chat_db::create_pool(&chat_db::DatabaseConfig::from(db))
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            chat_db::ensure_schema(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            info!("PostgreSQL connection established");

            builder
                .account_repo(Arc::new(chat_db::PgAccountRepository::new(pool.clone())))
                .device_repo(Arc::new(chat_db::PgDeviceRepository::new(pool.clone())))
                .chat_session_repo(Arc::new(chat_db::PgChatSessionRepository::new(pool.clone())))
                .message_repo(Arc::new(chat_db::PgMessageRepository::new(pool)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            builder.store(chat_db::MemoryStore::new())
        }
    };

    let service_context = builder
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    Ok(GatewayState::new(service_context, config))
}

/// Accept connections until the process is interrupted.
///
/// Accept failures (descriptor exhaustion, aborted handshakes) are logged and
/// retried; they never stop the server.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, state: GatewayState) {
    let listener = &listener;
    loop {
        let (stream, addr) = tokio::select! {
            accepted = accept_with_backoff(move || listener.accept()) => accepted,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return;
            }
        };

        let acceptor = acceptor.clone();
        let state = state.clone();
        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => handle_connection(state, tls_stream, addr).await,
                Err(e) => debug!(peer = %addr, error = %e, "TLS handshake failed"),
            }
        });
    }
}

/// Call `accept` until it yields a connection, backing off after each error
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed, retrying");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();
    let acceptor = load_tls_acceptor(&config.tls)?;
    let state = create_gateway_state(config).await?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;
    info!("Gateway listening on {}", addr);

    serve(listener, acceptor, state).await;
    info!("Gateway stopped");
    Ok(())
}
