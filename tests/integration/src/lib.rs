//! Integration test utilities for the chat server
//!
//! Runs the gateway's connection task over in-memory duplex streams, backed
//! by a [`chat_db::MemoryStore`] and a notifier that records every
//! verification code instead of mailing it.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
