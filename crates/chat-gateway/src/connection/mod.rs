//! Connection management
//!
//! Open connections, the identities they authenticate as, and the
//! per-connection abuse guard.

mod abuse_guard;
mod connection;
mod identity;
mod manager;

pub use abuse_guard::{AbuseGuard, Verdict};
pub use connection::{Connection, Outbound};
pub use identity::ClientIdentity;
pub use manager::ConnectionManager;
