//! Test fixtures and data generators
//!
//! Provides reusable test data for integration tests.

use chat_common::{AppConfig, IdPoolConfig, RateLimitConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU32 = AtomicU32::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u32 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A peer address no other test uses
pub fn unique_addr() -> SocketAddr {
    let n = unique_suffix();
    let ip = Ipv4Addr::new(10, (n >> 16) as u8, (n >> 8) as u8, n as u8);
    SocketAddr::new(IpAddr::V4(ip), 40_000 + (n % 20_000) as u16)
}

/// Another port on the same address, as a second device behind one IP
pub fn same_ip(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip(), addr.port().wrapping_add(1))
}

/// Account credentials
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl TestAccount {
    pub fn unique() -> Self {
        let suffix = unique_suffix();
        Self {
            email: format!("user{suffix}@example.com"),
            username: format!("user{suffix}"),
            password: "Tr0ub4dor&3-Horse".to_string(),
        }
    }
}

/// Server configuration for tests: memory storage, a lenient rate limit and
/// small ID batches
pub fn test_config() -> AppConfig {
    AppConfig {
        rate_limit: RateLimitConfig {
            requests_per_second: 1_000,
            ban_seconds: 1,
        },
        id_pool: IdPoolConfig {
            client_id_max: 100_000,
            chat_session_id_max: 100_000,
            batch_size: 64,
        },
        ..AppConfig::default()
    }
}
