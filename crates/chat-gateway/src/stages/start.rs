//! Start stage: pick login or account creation

use chat_service::AccountService;
use std::sync::Arc;
use tracing::debug;

use super::entry::EntryState;
use super::verification::{self, PendingEntry};
use super::{authenticate, report_entry_failure, ConnectionStage, StageResult, DEFAULT_DEVICE_INFO};
use crate::connection::Connection;
use crate::error::HandlerError;
use crate::protocol::{ClientMessage, EntryResultCode, ServerMessage};
use crate::server::GatewayState;

pub(super) async fn handle(
    state: &GatewayState,
    connection: &Arc<Connection>,
    message: ClientMessage,
) -> StageResult {
    let (entry_type, inline) = match message {
        ClientMessage::EntryType { entry_type, inline } => (entry_type, inline),
        other => return Err(HandlerError::unexpected("START", other.name())),
    };

    let mut entry = EntryState::new(entry_type);
    let Some(login) = inline else {
        return Ok(Some(ConnectionStage::Entry(entry)));
    };

    let accounts = AccountService::new(state.service_context());
    match accounts.check_login(&login.email, &login.password).await {
        Ok(client_id) => {
            // Known device: no email round trip
            if accounts.is_device_verified(client_id, connection.ip()).await? {
                let next = authenticate(state, connection, client_id, DEFAULT_DEVICE_INFO).await?;
                connection.send_message(&ServerMessage::entry_result(
                    EntryResultCode::Success,
                    "Logged in",
                ));
                return Ok(Some(next));
            }

            debug!(conn_id = %connection.id(), client_id = %client_id, "Unverified device, verification required");
            let next = verification::begin(
                state,
                connection,
                PendingEntry::Login {
                    client_id,
                    email: login.email,
                },
                entry.device_info(),
            )
            .await?;
            Ok(Some(next))
        }
        Err(e) => {
            report_entry_failure(connection, &e);
            entry.prefill_login(login);
            Ok(Some(ConnectionStage::Entry(entry)))
        }
    }
}
