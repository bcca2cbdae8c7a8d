//! PostgreSQL implementation of ChatSessionRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::ChatSession;
use chat_core::error::DomainError;
use chat_core::traits::{ChatSessionRepository, RepoResult};
use chat_core::value_objects::{ChatSessionId, ClientId};

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of ChatSessionRepository
#[derive(Clone)]
pub struct PgChatSessionRepository {
    pool: PgPool,
}

impl PgChatSessionRepository {
    /// Create a new PgChatSessionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Fold `(session, member)` rows ordered by session into sessions
fn group_members(rows: Vec<(i32, i32)>) -> Vec<ChatSession> {
    let mut sessions: Vec<ChatSession> = Vec::new();
    for (session_id, client_id) in rows {
        let session_id = ChatSessionId::new(session_id);
        match sessions.last_mut() {
            Some(last) if last.id == session_id => last.members.push(ClientId::new(client_id)),
            _ => sessions.push(ChatSession::new(session_id, vec![ClientId::new(client_id)])),
        }
    }
    sessions
}

#[async_trait]
impl ChatSessionRepository for PgChatSessionRepository {
    #[instrument(skip(self))]
    async fn chat_sessions_of(&self, client_id: ClientId) -> RepoResult<Vec<ChatSession>> {
        let rows = sqlx::query_as::<_, (i32, i32)>(
            r"
            SELECT m.session_id, m.client_id
            FROM chat_session_members m
            WHERE m.session_id IN (
                SELECT session_id FROM chat_session_members WHERE client_id = $1
            )
            ORDER BY m.session_id, m.position
            ",
        )
        .bind(client_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(group_members(rows))
    }

    #[instrument(skip(self))]
    async fn members_of(&self, session_id: ChatSessionId) -> RepoResult<Vec<ClientId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT client_id FROM chat_session_members WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ids.into_iter().map(ClientId::new).collect())
    }

    #[instrument(skip(self))]
    async fn chat_session_between(
        &self,
        a: ClientId,
        b: ClientId,
    ) -> RepoResult<Option<ChatSessionId>> {
        let result = sqlx::query_scalar::<_, i32>(
            r"
            SELECT session_id
            FROM chat_session_members
            GROUP BY session_id
            HAVING COUNT(*) = 2
               AND BOOL_OR(client_id = $1)
               AND BOOL_OR(client_id = $2)
            LIMIT 1
            ",
        )
        .bind(a.into_inner())
        .bind(b.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(ChatSessionId::new))
    }

    #[instrument(skip(self))]
    async fn chat_requests_of(&self, receiver: ClientId) -> RepoResult<Vec<ClientId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT sender FROM chat_requests WHERE receiver = $1 ORDER BY created_at",
        )
        .bind(receiver.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ids.into_iter().map(ClientId::new).collect())
    }

    #[instrument(skip(self))]
    async fn send_chat_request(&self, sender: ClientId, receiver: ClientId) -> RepoResult<()> {
        sqlx::query("INSERT INTO chat_requests (sender, receiver) VALUES ($1, $2)")
            .bind(sender.into_inner())
            .bind(receiver.into_inner())
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || DomainError::ChatRequestExists))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn accept_chat_request(
        &self,
        receiver: ClientId,
        sender: ClientId,
        session_id: ChatSessionId,
    ) -> RepoResult<ChatSession> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let removed = sqlx::query("DELETE FROM chat_requests WHERE sender = $1 AND receiver = $2")
            .bind(sender.into_inner())
            .bind(receiver.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        if removed.rows_affected() == 0 {
            return Err(DomainError::ChatRequestNotFound(sender));
        }

        sqlx::query("INSERT INTO chat_sessions (session_id) VALUES ($1)")
            .bind(session_id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_unique_violation(e, || {
                    DomainError::InternalError(format!("Chat session {session_id} already exists"))
                })
            })?;

        let members = vec![sender, receiver];
        for (position, member) in members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chat_session_members (session_id, client_id, position) VALUES ($1, $2, $3)",
            )
            .bind(session_id.into_inner())
            .bind(member.into_inner())
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;

        Ok(ChatSession::new(session_id, members))
    }

    #[instrument(skip(self))]
    async fn decline_chat_request(&self, receiver: ClientId, sender: ClientId) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM chat_requests WHERE sender = $1 AND receiver = $2")
            .bind(sender.into_inner())
            .bind(receiver.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_chat_session(&self, session_id: ChatSessionId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE session_id = $1")
            .bind(session_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ChatSessionNotFound(session_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn chat_session_ids_in_use(&self) -> RepoResult<Vec<ChatSessionId>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT session_id FROM chat_sessions")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(ids.into_iter().map(ChatSessionId::new).collect())
    }
}
