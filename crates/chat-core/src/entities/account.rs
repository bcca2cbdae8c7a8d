//! Account entity - a registered client

use chrono::{DateTime, Utc};

use crate::value_objects::ClientId;

/// Persisted account profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub client_id: ClientId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Stored login secret for an email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: ClientId,
    pub password_hash: String,
}

/// Everything needed to persist a freshly verified account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub client_id: ClientId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Hashes of the one-time backup verification codes
    pub backup_code_hashes: Vec<String>,
}

impl NewAccount {
    /// Split into the public profile and its secret parts
    pub fn into_account(self) -> (Account, String, Vec<String>) {
        let account = Account {
            client_id: self.client_id,
            username: self.username,
            email: self.email,
            created_at: Utc::now(),
        };
        (account, self.password_hash, self.backup_code_hashes)
    }
}
