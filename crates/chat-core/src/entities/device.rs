//! Device entity - a verified (client, address) pair

use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::value_objects::ClientId;

/// A device the client has logged in from.
///
/// While the row exists the address counts as verified for that client and
/// skips email verification on the next login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub client_id: ClientId,
    pub ip: IpAddr,
    pub info: String,
    pub logged_in_at: DateTime<Utc>,
}

impl Device {
    pub fn new(client_id: ClientId, ip: IpAddr, info: impl Into<String>) -> Self {
        Self {
            client_id,
            ip,
            info: info.into(),
            logged_in_at: Utc::now(),
        }
    }
}
