//! Gateway state
//!
//! Application state for the gateway server.

use crate::connection::ConnectionManager;
use crate::registry::SessionRegistry;
use chat_common::AppConfig;
use chat_service::ServiceContext;
use std::sync::Arc;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server. Cloning is cheap;
/// every connection task and command worker holds its own clone.
#[derive(Clone)]
pub struct GatewayState {
    /// Service context with repositories, ID allocators and the email queue
    service_context: Arc<ServiceContext>,
    /// Open connections and client identities
    connection_manager: Arc<ConnectionManager>,
    /// Active connections per chat session
    session_registry: Arc<SessionRegistry>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(service_context: ServiceContext, config: AppConfig) -> Self {
        Self {
            service_context: Arc::new(service_context),
            connection_manager: ConnectionManager::new_shared(),
            session_registry: SessionRegistry::new_shared(),
            config: Arc::new(config),
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Get the connection manager
    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection_manager
    }

    /// Get the chat-session registry
    pub fn session_registry(&self) -> &SessionRegistry {
        &self.session_registry
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connection_manager", &self.connection_manager)
            .field("session_registry", &self.session_registry)
            .field("config", &"AppConfig")
            .finish()
    }
}
