//! # chat-gateway
//!
//! TLS chat server: length-prefixed framing, the per-connection protocol
//! stage machine, command dispatch and the chat-session registry.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stages;

pub use error::{HandlerError, HandlerResult};
pub use registry::SessionRegistry;
pub use server::{create_gateway_state, handle_connection, run, GatewayState};
