//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::Message;
use chat_core::traits::{MessageRepository, RepoResult};
use chat_core::value_objects::{ChatSessionId, MessageId};

use crate::models::MessageModel;

use super::error::map_db_error;

/// PostgreSQL implementation of MessageRepository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(session_id = %message.session_id, message_id = %message.id))]
    async fn add_message(&self, message: &Message) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r"
            INSERT INTO messages (session_id, message_id, author_id, content_type, payload, file_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(message.session_id.into_inner())
        .bind(message.id.into_inner())
        .bind(message.author_id.into_inner())
        .bind(message.content_type.as_u32() as i32)
        .bind(&message.payload)
        .bind(&message.file_name)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r"
            UPDATE chat_sessions
            SET last_message_id = GREATEST(last_message_id, $2)
            WHERE session_id = $1
            ",
        )
        .bind(message.session_id.into_inner())
        .bind(message.id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn select_messages(
        &self,
        session_id: ChatSessionId,
        offset: u32,
        count: u32,
    ) -> RepoResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageModel>(
            r"
            SELECT session_id, message_id, author_id, content_type, payload, file_name, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY message_id DESC
            OFFSET $2
            LIMIT $3
            ",
        )
        .bind(session_id.into_inner())
        .bind(i64::from(offset))
        .bind(i64::from(count))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut messages = rows
            .into_iter()
            .map(Message::try_from)
            .collect::<RepoResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn find_message(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageModel>(
            r"
            SELECT session_id, message_id, author_id, content_type, payload, file_name, created_at
            FROM messages
            WHERE session_id = $1 AND message_id = $2
            ",
        )
        .bind(session_id.into_inner())
        .bind(message_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Message::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_message(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = $1 AND message_id = $2")
            .bind(session_id.into_inner())
            .bind(message_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn file(
        &self,
        session_id: ChatSessionId,
        message_id: MessageId,
    ) -> RepoResult<Option<(String, Vec<u8>)>> {
        sqlx::query_as::<_, (String, Vec<u8>)>(
            r"
            SELECT file_name, payload
            FROM messages
            WHERE session_id = $1 AND message_id = $2 AND file_name IS NOT NULL
            ",
        )
        .bind(session_id.into_inner())
        .bind(message_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn max_message_id(&self, session_id: ChatSessionId) -> RepoResult<Option<MessageId>> {
        let last = sqlx::query_scalar::<_, i32>(
            "SELECT last_message_id FROM chat_sessions WHERE session_id = $1",
        )
        .bind(session_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(last.filter(|id| *id > 0).map(MessageId::new))
    }
}
