//! Account entity <-> model mapper

use chat_core::entities::{Account, Credentials};
use chat_core::value_objects::ClientId;

use crate::models::{AccountModel, CredentialsModel};

impl From<AccountModel> for Account {
    fn from(model: AccountModel) -> Self {
        Account {
            client_id: ClientId::new(model.client_id),
            username: model.username,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

impl From<CredentialsModel> for Credentials {
    fn from(model: CredentialsModel) -> Self {
        Credentials {
            client_id: ClientId::new(model.client_id),
            password_hash: model.password_hash,
        }
    }
}
