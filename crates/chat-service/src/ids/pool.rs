//! Shuffled pool allocator for client and chat-session IDs
//!
//! Unused IDs are kept in a deque that is refilled in batches. A refill
//! asks storage for every ID in use, walks the ID space from its minimum,
//! and keeps up to `batch_size` free candidates in random order so IDs do
//! not leak creation order.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use chat_core::traits::{AccountRepository, ChatSessionRepository, RepoResult};
use chat_core::value_objects::{ChatSessionId, ClientId};
use chat_core::DomainError;

/// Identifier type a pool can hand out
pub trait PoolId: Copy + Eq + Hash + fmt::Display + From<i32> + Into<i32> + Send + Sync {}

impl PoolId for ClientId {}
impl PoolId for ChatSessionId {}

/// Where a pool learns which IDs are already taken
#[async_trait]
pub trait IdSource<T>: Send + Sync {
    async fn ids_in_use(&self) -> RepoResult<Vec<T>>;
}

/// Client IDs held by persisted accounts
pub struct AccountIds(pub Arc<dyn AccountRepository>);

#[async_trait]
impl IdSource<ClientId> for AccountIds {
    async fn ids_in_use(&self) -> RepoResult<Vec<ClientId>> {
        self.0.client_ids_in_use().await
    }
}

/// Chat-session IDs held by persisted sessions
pub struct ChatSessionIds(pub Arc<dyn ChatSessionRepository>);

#[async_trait]
impl IdSource<ChatSessionId> for ChatSessionIds {
    async fn ids_in_use(&self) -> RepoResult<Vec<ChatSessionId>> {
        self.0.chat_session_ids_in_use().await
    }
}

/// ID pool errors
#[derive(Debug, thiserror::Error)]
pub enum IdPoolError {
    #[error("No {0} IDs available")]
    NotAvailable(&'static str),

    #[error(transparent)]
    Storage(#[from] DomainError),
}

struct PoolState<T> {
    available: VecDeque<T>,
    /// Handed out since the last refill and not yet seen in storage
    issued: HashSet<T>,
}

/// Pool allocator for one ID space
pub struct IdPool<T: PoolId> {
    name: &'static str,
    min: i32,
    max: i32,
    batch_size: usize,
    source: Arc<dyn IdSource<T>>,
    state: Mutex<PoolState<T>>,
}

impl<T: PoolId> IdPool<T> {
    /// Create a pool handing out IDs in `min..=max`
    pub fn new(
        name: &'static str,
        min: i32,
        max: i32,
        batch_size: usize,
        source: Arc<dyn IdSource<T>>,
    ) -> Self {
        Self {
            name,
            min,
            max,
            batch_size: batch_size.max(1),
            source,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                issued: HashSet::new(),
            }),
        }
    }

    /// Take one unused ID, refilling from storage first when the pool is empty.
    ///
    /// Concurrent callers never receive the same ID unless it was returned
    /// through [`IdPool::undo`].
    #[instrument(skip(self), fields(pool = self.name))]
    pub async fn retrieve_and_delete(&self) -> Result<T, IdPoolError> {
        let mut state = self.state.lock().await;

        if state.available.is_empty() {
            self.regenerate(&mut state).await?;
        }

        let id = state
            .available
            .pop_front()
            .ok_or(IdPoolError::NotAvailable(self.name))?;
        state.issued.insert(id);
        Ok(id)
    }

    /// Give back an ID that was taken but never persisted
    pub async fn undo(&self, id: T) {
        let mut state = self.state.lock().await;
        if state.issued.remove(&id) {
            state.available.push_front(id);
        } else {
            warn!(pool = self.name, id = %id, "Ignoring undo of an ID this pool did not issue");
        }
    }

    /// IDs currently buffered
    pub async fn available(&self) -> usize {
        self.state.lock().await.available.len()
    }

    async fn regenerate(&self, state: &mut PoolState<T>) -> Result<(), IdPoolError> {
        let in_use: HashSet<T> = self.source.ids_in_use().await?.into_iter().collect();

        // Persisted IDs no longer need tracking as in-flight
        state.issued.retain(|id| !in_use.contains(id));

        let mut candidates = Vec::with_capacity(self.batch_size.min(1 << 16));
        let mut next = self.min;
        while candidates.len() < self.batch_size && next <= self.max {
            let id = T::from(next);
            if !in_use.contains(&id) && !state.issued.contains(&id) {
                candidates.push(id);
            }
            match next.checked_add(1) {
                Some(n) => next = n,
                None => break,
            }
        }

        if candidates.is_empty() {
            warn!(pool = self.name, "ID space exhausted");
            return Err(IdPoolError::NotAvailable(self.name));
        }

        candidates.shuffle(&mut rand::thread_rng());
        debug!(pool = self.name, count = candidates.len(), "Refilled ID pool");
        state.available.extend(candidates);
        Ok(())
    }
}

impl<T: PoolId> fmt::Debug for IdPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdPool")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
