//! PostgreSQL implementation of AccountRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::{Account, Credentials, NewAccount};
use chat_core::error::DomainError;
use chat_core::traits::{AccountRepository, RepoResult};
use chat_core::value_objects::ClientId;

use crate::models::{AccountModel, CredentialsModel};

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of AccountRepository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new PgAccountRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, client_id: ClientId) -> RepoResult<Option<Account>> {
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT client_id, username, email, created_at
            FROM accounts
            WHERE client_id = $1
            ",
        )
        .bind(client_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Account::from))
    }

    #[instrument(skip(self))]
    async fn find_client_id(&self, email: &str) -> RepoResult<Option<ClientId>> {
        let result =
            sqlx::query_scalar::<_, i32>("SELECT client_id FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(result.map(ClientId::new))
    }

    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn credentials(&self, email: &str) -> RepoResult<Option<Credentials>> {
        let result = sqlx::query_as::<_, CredentialsModel>(
            "SELECT client_id, password_hash FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Credentials::from))
    }

    #[instrument(skip(self, account), fields(client_id = %account.client_id))]
    async fn create_account(&self, account: &NewAccount) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r"
            INSERT INTO accounts (client_id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(account.client_id.into_inner())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, || DomainError::EmailAlreadyExists))?;

        for hash in &account.backup_code_hashes {
            sqlx::query("INSERT INTO backup_codes (client_id, code_hash) VALUES ($1, $2)")
                .bind(account.client_id.into_inner())
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn change_username(&self, client_id: ClientId, username: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE accounts SET username = $2 WHERE client_id = $1")
            .bind(client_id.into_inner())
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ClientNotFound(client_id));
        }
        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn change_password(&self, client_id: ClientId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $2 WHERE client_id = $1")
            .bind(client_id.into_inner())
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ClientNotFound(client_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn backup_code_hashes(&self, client_id: ClientId) -> RepoResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT code_hash FROM backup_codes WHERE client_id = $1")
            .bind(client_id.into_inner())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self, code_hash))]
    async fn remove_backup_code(&self, client_id: ClientId, code_hash: &str) -> RepoResult<bool> {
        let result =
            sqlx::query("DELETE FROM backup_codes WHERE client_id = $1 AND code_hash = $2")
                .bind(client_id.into_inner())
                .bind(code_hash)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, code_hashes))]
    async fn replace_backup_codes(
        &self,
        client_id: ClientId,
        code_hashes: &[String],
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query("DELETE FROM backup_codes WHERE client_id = $1")
            .bind(client_id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        for hash in code_hashes {
            sqlx::query("INSERT INTO backup_codes (client_id, code_hash) VALUES ($1, $2)")
                .bind(client_id.into_inner())
                .bind(hash)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)
    }

    #[instrument(skip(self, icon), fields(icon_len = icon.len()))]
    async fn set_icon(&self, client_id: ClientId, icon: &[u8]) -> RepoResult<()> {
        let result = sqlx::query("UPDATE accounts SET icon = $2 WHERE client_id = $1")
            .bind(client_id.into_inner())
            .bind(icon)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ClientNotFound(client_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn icon(&self, client_id: ClientId) -> RepoResult<Option<Vec<u8>>> {
        let result = sqlx::query_scalar::<_, Option<Vec<u8>>>(
            "SELECT icon FROM accounts WHERE client_id = $1",
        )
        .bind(client_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.flatten())
    }

    #[instrument(skip(self))]
    async fn client_ids_in_use(&self) -> RepoResult<Vec<ClientId>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT client_id FROM accounts")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(ids.into_iter().map(ClientId::new).collect())
    }
}
