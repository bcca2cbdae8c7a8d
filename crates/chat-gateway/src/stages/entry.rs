//! Entry stage: collect and validate credentials
//!
//! Fields arrive one `CREDENTIAL` at a time and may be resubmitted. Once every
//! field the entry type needs is present the set is validated; a failure is
//! reported and the stage is kept.

use chat_service::AccountService;
use std::sync::Arc;

use super::verification::{self, PendingEntry};
use super::{
    authenticate, report_entry_failure, ConnectionStage, StageResult, DEFAULT_DEVICE_INFO,
    MAX_DEVICE_INFO_CHARS,
};
use crate::connection::Connection;
use crate::error::HandlerError;
use crate::protocol::{
    ClientMessage, CredentialKind, EntryAction, EntryResultCode, EntryType, InlineLogin,
    ServerMessage,
};
use crate::server::GatewayState;

/// Credentials gathered so far
pub struct EntryState {
    entry_type: EntryType,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    backup_code: Option<String>,
    backup_mode: bool,
    device_info: Option<String>,
}

impl EntryState {
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            email: None,
            username: None,
            password: None,
            backup_code: None,
            backup_mode: false,
            device_info: None,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_backup_mode(&self) -> bool {
        self.backup_mode
    }

    pub fn device_info(&self) -> &str {
        self.device_info.as_deref().unwrap_or(DEFAULT_DEVICE_INFO)
    }

    pub(super) fn prefill_login(&mut self, login: InlineLogin) {
        self.email = Some(login.email);
        self.password = Some(login.password);
    }

    fn set(&mut self, kind: CredentialKind, value: String) {
        let slot = match kind {
            CredentialKind::Email => &mut self.email,
            CredentialKind::Username => &mut self.username,
            CredentialKind::Password => &mut self.password,
            CredentialKind::BackupCode => &mut self.backup_code,
        };
        *slot = Some(value);
    }

    fn set_device_info(&mut self, info: &str) {
        self.device_info = Some(info.trim().chars().take(MAX_DEVICE_INFO_CHARS).collect());
    }
}

impl std::fmt::Debug for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryState")
            .field("entry_type", &self.entry_type)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("backup_mode", &self.backup_mode)
            .finish_non_exhaustive()
    }
}

pub(super) async fn handle(
    state: &GatewayState,
    connection: &Arc<Connection>,
    entry: &mut EntryState,
    message: ClientMessage,
) -> StageResult {
    match message {
        ClientMessage::Credential { kind, value } => {
            entry.set(kind, value);
            try_complete(state, connection, entry).await
        }
        ClientMessage::EntryAction(EntryAction::SetBackupCodeMode(on)) => {
            if on && entry.entry_type == EntryType::CreateAccount {
                connection.send_message(&ServerMessage::entry_result(
                    EntryResultCode::ValidationFailed,
                    "Backup codes can only be used to log in",
                ));
                return Ok(None);
            }
            entry.backup_mode = on;
            try_complete(state, connection, entry).await
        }
        ClientMessage::EntryAction(EntryAction::DeviceInfo(info)) => {
            entry.set_device_info(&info);
            Ok(None)
        }
        ClientMessage::EntryAction(EntryAction::Back) => Ok(Some(ConnectionStage::Start)),
        other => Err(HandlerError::unexpected("ENTRY", other.name())),
    }
}

/// Validate once every required field is present
async fn try_complete(
    state: &GatewayState,
    connection: &Arc<Connection>,
    entry: &EntryState,
) -> StageResult {
    let accounts = AccountService::new(state.service_context());

    match entry.entry_type {
        EntryType::Login if entry.backup_mode => {
            let (Some(email), Some(code)) = (&entry.email, &entry.backup_code) else {
                return Ok(None);
            };
            match accounts.login_with_backup_code(email, code).await {
                Ok(client_id) => {
                    let next =
                        authenticate(state, connection, client_id, entry.device_info()).await?;
                    connection.send_message(&ServerMessage::entry_result(
                        EntryResultCode::Success,
                        "Logged in with a backup code",
                    ));
                    Ok(Some(next))
                }
                Err(e) => {
                    report_entry_failure(connection, &e);
                    Ok(None)
                }
            }
        }
        EntryType::Login => {
            let (Some(email), Some(password)) = (&entry.email, &entry.password) else {
                return Ok(None);
            };
            match accounts.check_login(email, password).await {
                Ok(client_id) => {
                    let pending = PendingEntry::Login {
                        client_id,
                        email: email.clone(),
                    };
                    let next =
                        verification::begin(state, connection, pending, entry.device_info()).await?;
                    Ok(Some(next))
                }
                Err(e) => {
                    report_entry_failure(connection, &e);
                    Ok(None)
                }
            }
        }
        EntryType::CreateAccount => {
            let (Some(email), Some(username), Some(password)) =
                (&entry.email, &entry.username, &entry.password)
            else {
                return Ok(None);
            };
            match accounts.validate_new_account(email, username, password).await {
                Ok(()) => {
                    let pending = PendingEntry::CreateAccount {
                        email: email.clone(),
                        username: username.clone(),
                        password: password.clone(),
                    };
                    let next =
                        verification::begin(state, connection, pending, entry.device_info()).await?;
                    Ok(Some(next))
                }
                Err(e) => {
                    report_entry_failure(connection, &e);
                    Ok(None)
                }
            }
        }
    }
}
