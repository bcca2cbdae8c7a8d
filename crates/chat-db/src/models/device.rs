//! Device database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for devices table
#[derive(Debug, Clone, FromRow)]
pub struct DeviceModel {
    pub client_id: i32,
    /// Textual `IpAddr`
    pub ip: String,
    pub info: String,
    pub logged_in_at: DateTime<Utc>,
}
