//! Per-connection message rate guard
//!
//! Counts inbound messages that arrive less than a second apart. A pause of a
//! full second resets the count. A connection that exceeds the limit is banned
//! for a cooldown: its messages are dropped and it is told about the ban
//! exactly once.

use chat_common::RateLimitConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Gap after which the count starts over
const WINDOW: Duration = Duration::from_secs(1);

/// What to do with an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Process normally
    Allow,
    /// This message tripped the limit; notify the peer, then drop it
    Banned,
    /// Banned earlier; drop silently
    Dropped,
}

#[derive(Debug)]
pub struct AbuseGuard {
    limit: u32,
    cooldown: Duration,
    last_request: Option<Instant>,
    count: u32,
    banned_until: Option<Instant>,
}

impl AbuseGuard {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.requests_per_second,
            cooldown: config.ban_duration(),
            last_request: None,
            count: 0,
            banned_until: None,
        }
    }

    /// Count one inbound message received at `now`
    pub fn check(&mut self, now: Instant) -> Verdict {
        if let Some(until) = self.banned_until {
            if now < until {
                return Verdict::Dropped;
            }
            self.banned_until = None;
            self.last_request = None;
        }

        let burst = self
            .last_request
            .is_some_and(|last| now.duration_since(last) < WINDOW);
        self.last_request = Some(now);

        if !burst {
            self.count = 1;
            return Verdict::Allow;
        }

        self.count += 1;
        if self.count > self.limit {
            self.banned_until = Some(now + self.cooldown);
            self.last_request = None;
            self.count = 0;
            return Verdict::Banned;
        }
        Verdict::Allow
    }

    pub fn is_banned(&self, now: Instant) -> bool {
        self.banned_until.is_some_and(|until| now < until)
    }
}
