//! Message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub session_id: i32,
    pub message_id: i32,
    pub author_id: i32,
    pub content_type: i32,
    pub payload: Vec<u8>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
