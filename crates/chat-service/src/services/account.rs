//! Account service
//!
//! Handles entry validation, account creation, credential checks, backup
//! codes, verification codes, profile changes and device bookkeeping.

use std::net::IpAddr;

use chat_common::auth::{
    generate_backup_code, hash_password, validate_email, validate_password_strength,
    validate_username, verify_password,
};
use chat_common::AppError;
use chat_core::entities::{Account, Device, NewAccount};
use chat_core::value_objects::ClientId;
use chat_core::DomainError;
use tracing::{info, instrument, warn};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::verification::VerificationCode;

/// A freshly persisted account and the only plaintext copy of its backup codes
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub client_id: ClientId,
    pub backup_codes: Vec<String>,
}

/// Account service
pub struct AccountService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountService<'a> {
    /// Create a new AccountService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // === Entry ===

    /// Check a create-account submission before verification starts
    #[instrument(skip(self, password), fields(email = %email, username = %username))]
    pub async fn validate_new_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> ServiceResult<()> {
        validate_username(username)?;
        validate_password_strength(password)?;
        validate_email(email)?;

        if self.ctx.account_repo().email_exists(email).await? {
            return Err(DomainError::EmailAlreadyExists.into());
        }
        Ok(())
    }

    /// Verify an email and password pair
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn check_login(&self, email: &str, password: &str) -> ServiceResult<ClientId> {
        let credentials = self
            .ctx
            .account_repo()
            .credentials(email)
            .await?
            .ok_or_else(|| {
                warn!("Login failed: unknown email");
                ServiceError::App(AppError::InvalidCredentials)
            })?;

        if !verify_password(password, &credentials.password_hash)? {
            warn!(client_id = %credentials.client_id, "Login failed: invalid password");
            return Err(ServiceError::App(AppError::InvalidCredentials));
        }

        Ok(credentials.client_id)
    }

    /// Log in with a one-time backup code, consuming it
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn login_with_backup_code(&self, email: &str, code: &str) -> ServiceResult<ClientId> {
        let client_id = self
            .ctx
            .account_repo()
            .find_client_id(email)
            .await?
            .ok_or(ServiceError::App(AppError::InvalidCredentials))?;

        let code = code.trim().to_ascii_uppercase();
        let hashes = self.ctx.account_repo().backup_code_hashes(client_id).await?;

        let mut matched = None;
        for hash in &hashes {
            if verify_password(&code, hash)? {
                matched = Some(hash);
                break;
            }
        }

        let Some(hash) = matched else {
            warn!(client_id = %client_id, "Backup code login failed");
            return Err(ServiceError::App(AppError::InvalidCredentials));
        };

        // A concurrent login may have consumed the same code first
        if !self
            .ctx
            .account_repo()
            .remove_backup_code(client_id, hash)
            .await?
        {
            return Err(ServiceError::App(AppError::InvalidCredentials));
        }

        info!(client_id = %client_id, remaining = hashes.len() - 1, "Backup code consumed");
        Ok(client_id)
    }

    /// Persist a verified account under a freshly allocated client ID
    #[instrument(skip(self, password), fields(email = %email, username = %username))]
    pub async fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> ServiceResult<CreatedAccount> {
        let password_hash = hash_password(password)?;
        let (backup_codes, backup_code_hashes) = self.fresh_backup_codes()?;

        let client_id = self.ctx.client_ids().retrieve_and_delete().await?;
        let account = NewAccount {
            client_id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            backup_code_hashes,
        };

        if let Err(e) = self.ctx.account_repo().create_account(&account).await {
            self.ctx.client_ids().undo(client_id).await;
            return Err(e.into());
        }

        info!(client_id = %client_id, "Account created");
        Ok(CreatedAccount {
            client_id,
            backup_codes,
        })
    }

    /// Replace every backup code of an account
    #[instrument(skip(self))]
    pub async fn regenerate_backup_codes(&self, client_id: ClientId) -> ServiceResult<Vec<String>> {
        let (codes, hashes) = self.fresh_backup_codes()?;
        self.ctx
            .account_repo()
            .replace_backup_codes(client_id, &hashes)
            .await?;
        info!(client_id = %client_id, "Backup codes regenerated");
        Ok(codes)
    }

    fn fresh_backup_codes(&self) -> ServiceResult<(Vec<String>, Vec<String>)> {
        let codes: Vec<String> = (0..self.ctx.verification().backup_code_count)
            .map(|_| generate_backup_code())
            .collect();
        let hashes = codes
            .iter()
            .map(|code| hash_password(code))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((codes, hashes))
    }

    // === Verification ===

    /// Issue a verification code and queue it for delivery
    #[instrument(skip(self), fields(email = %email))]
    pub async fn start_verification(&self, email: &str) -> ServiceResult<VerificationCode> {
        let code = VerificationCode::issue(self.ctx.verification());
        self.ctx.email_queue().enqueue(email, code.code()).await?;
        Ok(code)
    }

    /// Queue the same code again
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn resend_verification(&self, email: &str, code: &VerificationCode) -> ServiceResult<()> {
        self.ctx.email_queue().enqueue(email, code.code()).await
    }

    // === Profile ===

    #[instrument(skip(self))]
    pub async fn account(&self, client_id: ClientId) -> ServiceResult<Account> {
        self.ctx
            .account_repo()
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| DomainError::ClientNotFound(client_id).into())
    }

    #[instrument(skip(self))]
    pub async fn change_username(&self, client_id: ClientId, username: &str) -> ServiceResult<()> {
        validate_username(username)?;
        self.ctx
            .account_repo()
            .change_username(client_id, username)
            .await?;
        info!(client_id = %client_id, "Username changed");
        Ok(())
    }

    /// Change the password after re-checking the current one
    #[instrument(skip(self, current, new_password))]
    pub async fn change_password(
        &self,
        client_id: ClientId,
        current: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let account = self.account(client_id).await?;
        self.check_login(&account.email, current).await?;
        validate_password_strength(new_password)?;

        let hash = hash_password(new_password)?;
        self.ctx
            .account_repo()
            .change_password(client_id, &hash)
            .await?;
        info!(client_id = %client_id, "Password changed");
        Ok(())
    }

    #[instrument(skip(self, icon), fields(size = icon.len()))]
    pub async fn set_icon(&self, client_id: ClientId, icon: &[u8]) -> ServiceResult<()> {
        self.ctx.account_repo().set_icon(client_id, icon).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn icon(&self, client_id: ClientId) -> ServiceResult<Option<Vec<u8>>> {
        Ok(self.ctx.account_repo().icon(client_id).await?)
    }

    // === Devices ===

    /// Whether any account has verified this address
    #[instrument(skip(self))]
    pub async fn is_ip_verified(&self, ip: IpAddr) -> ServiceResult<bool> {
        Ok(self.ctx.device_repo().is_ip_verified(ip).await?)
    }

    #[instrument(skip(self))]
    pub async fn is_device_verified(&self, client_id: ClientId, ip: IpAddr) -> ServiceResult<bool> {
        Ok(self.ctx.device_repo().is_device_verified(client_id, ip).await?)
    }

    /// Record a login from `ip`, marking it verified for the account
    #[instrument(skip(self, info))]
    pub async fn register_device(
        &self,
        client_id: ClientId,
        ip: IpAddr,
        info: &str,
    ) -> ServiceResult<()> {
        self.ctx
            .device_repo()
            .register_device(&Device::new(client_id, ip, info))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn devices(&self, client_id: ClientId) -> ServiceResult<Vec<Device>> {
        Ok(self.ctx.device_repo().devices_of(client_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, client_id: ClientId, ip: IpAddr) -> ServiceResult<()> {
        if !self.ctx.device_repo().logout(client_id, ip).await? {
            warn!(client_id = %client_id, "Logout of an unregistered device");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn logout_all_devices(&self, client_id: ClientId) -> ServiceResult<u64> {
        let removed = self.ctx.device_repo().logout_all_devices(client_id).await?;
        info!(client_id = %client_id, removed, "Logged out of all devices");
        Ok(removed)
    }
}
