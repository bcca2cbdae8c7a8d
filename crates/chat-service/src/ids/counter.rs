//! Per-session message ID counter

use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use chat_core::traits::{MessageRepository, RepoResult};
use chat_core::value_objects::{ChatSessionId, MessageId};

/// Monotonic message IDs per chat session, seeded lazily from storage
#[derive(Debug, Default)]
pub struct MessageIdCounter {
    counters: DashMap<ChatSessionId, Arc<AtomicI32>>,
}

impl MessageIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next message ID for `session_id`.
    ///
    /// The first call for a session reads the highest persisted ID. Two
    /// first calls racing each other both read storage, but only one seed
    /// wins the map entry and both then increment the same counter.
    pub async fn increment_and_get(
        &self,
        session_id: ChatSessionId,
        messages: &dyn MessageRepository,
    ) -> RepoResult<MessageId> {
        let counter = match self.counters.get(&session_id) {
            Some(counter) => Arc::clone(counter.value()),
            None => {
                // Storage is queried without holding a shard lock
                let seed = messages
                    .max_message_id(session_id)
                    .await?
                    .map_or(0, MessageId::into_inner);
                Arc::clone(
                    self.counters
                        .entry(session_id)
                        .or_insert_with(|| Arc::new(AtomicI32::new(seed)))
                        .value(),
                )
            }
        };

        Ok(MessageId::new(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    /// Drop the counter of a deleted session
    pub fn forget(&self, session_id: ChatSessionId) {
        self.counters.remove(&session_id);
    }

    pub fn tracked_sessions(&self) -> usize {
        self.counters.len()
    }
}
