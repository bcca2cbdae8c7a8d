//! # chat-common
//!
//! Shared utilities including configuration, error handling, credential policy, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{
    generate_backup_code, generate_verification_code, hash_password, validate_email,
    validate_password_strength, validate_username, verify_password,
};
pub use config::{
    AppConfig, AppSettings, ConfigError, DatabaseConfig, Environment, FrameLimits, IdPoolConfig,
    RateLimitConfig, ServerConfig, StorageBackend, TlsConfig, VerificationConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
