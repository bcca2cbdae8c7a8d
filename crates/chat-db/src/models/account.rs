//! Account database models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Public columns of the accounts table
#[derive(Debug, Clone, FromRow)]
pub struct AccountModel {
    pub client_id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Login lookup row
#[derive(Debug, Clone, FromRow)]
pub struct CredentialsModel {
    pub client_id: i32,
    pub password_hash: String,
}
