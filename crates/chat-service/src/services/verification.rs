//! One-time email verification codes

use std::time::Duration;
use tokio::time::Instant;

use chat_common::auth::generate_verification_code;
use chat_common::VerificationConfig;

/// Result of checking one guess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Success,
    /// Wrong code, more guesses allowed
    Retry { attempts_left: u32 },
    /// Wrong code and no guesses left
    Exhausted,
    /// The code outlived its lifetime
    Expired,
}

impl VerificationOutcome {
    /// Whether the verification flow is over
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Retry { .. })
    }
}

/// A code waiting to be confirmed
#[derive(Clone)]
pub struct VerificationCode {
    code: String,
    issued_at: Instant,
    ttl: Duration,
    attempts_left: u32,
}

impl VerificationCode {
    /// Generate a fresh code
    pub fn issue(config: &VerificationConfig) -> Self {
        Self::with_code(
            generate_verification_code(config.code_length),
            config.attempts,
            config.code_ttl(),
        )
    }

    pub(crate) fn with_code(code: String, attempts: u32, ttl: Duration) -> Self {
        Self {
            code,
            issued_at: Instant::now(),
            ttl,
            attempts_left: attempts.max(1),
        }
    }

    /// The secret, for (re)delivery only
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() >= self.ttl
    }

    /// Check a guess, consuming an attempt on mismatch
    pub fn check(&mut self, guess: &str) -> VerificationOutcome {
        if self.attempts_left == 0 {
            return VerificationOutcome::Exhausted;
        }
        if self.is_expired() {
            self.attempts_left = 0;
            return VerificationOutcome::Expired;
        }
        if guess.trim() == self.code {
            return VerificationOutcome::Success;
        }

        self.attempts_left -= 1;
        if self.attempts_left == 0 {
            VerificationOutcome::Exhausted
        } else {
            VerificationOutcome::Retry {
                attempts_left: self.attempts_left,
            }
        }
    }
}

impl std::fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationCode")
            .field("code", &"[redacted]")
            .field("attempts_left", &self.attempts_left)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}
