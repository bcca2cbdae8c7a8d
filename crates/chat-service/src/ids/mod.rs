//! Identifier allocation
//!
//! Client and chat-session IDs come from shuffled pools refilled against
//! storage. Message IDs are a per-session counter.

mod counter;
mod pool;

pub use counter::MessageIdCounter;
pub use pool::{AccountIds, ChatSessionIds, IdPool, IdPoolError, IdSource, PoolId};

use chat_core::value_objects::{ChatSessionId, ClientId};

pub type ClientIdPool = IdPool<ClientId>;
pub type ChatSessionIdPool = IdPool<ChatSessionId>;
