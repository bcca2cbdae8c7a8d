//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub storage: StorageBackend,
    pub tls: TlsConfig,
    pub rate_limit: RateLimitConfig,
    pub limits: FrameLimits,
    pub verification: VerificationConfig,
    pub id_pool: IdPoolConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: default_env(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where accounts, sessions and messages are persisted
#[derive(Debug, Clone, Default)]
pub enum StorageBackend {
    Postgres(DatabaseConfig),
    /// Process-local store, lost on restart
    #[default]
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// PEM files for the TLS listener
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Per-connection abuse guard
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Messages allowed inside one 1-second window
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_ban_seconds")]
    pub ban_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            ban_seconds: default_ban_seconds(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_seconds)
    }
}

/// Framing limits
#[derive(Debug, Clone, Deserialize)]
pub struct FrameLimits {
    /// Largest frame accepted before authentication
    #[serde(default = "default_unauthenticated_frame_bytes")]
    pub unauthenticated_frame_bytes: usize,
    /// Largest frame accepted once authenticated
    #[serde(default = "default_authenticated_frame_bytes")]
    pub authenticated_frame_bytes: usize,
    /// Payloads at or above this size are compressed on the way out
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            unauthenticated_frame_bytes: default_unauthenticated_frame_bytes(),
            authenticated_frame_bytes: default_authenticated_frame_bytes(),
            compression_threshold: default_compression_threshold(),
        }
    }
}

/// Email verification flow
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_code_ttl_seconds")]
    pub code_ttl_seconds: u64,
    /// Number of backup codes issued per account
    #[serde(default = "default_backup_code_count")]
    pub backup_code_count: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            attempts: default_attempts(),
            code_ttl_seconds: default_code_ttl_seconds(),
            backup_code_count: default_backup_code_count(),
        }
    }
}

impl VerificationConfig {
    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_seconds)
    }
}

/// ID allocator pools
#[derive(Debug, Clone, Deserialize)]
pub struct IdPoolConfig {
    #[serde(default = "default_client_id_max")]
    pub client_id_max: i32,
    #[serde(default = "default_chat_session_id_max")]
    pub chat_session_id_max: i32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IdPoolConfig {
    fn default() -> Self {
        Self {
            client_id_max: default_client_id_max(),
            chat_session_id_max: default_chat_session_id_max(),
            batch_size: default_batch_size(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-server".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_ban_seconds() -> u64 {
    10
}

fn default_unauthenticated_frame_bytes() -> usize {
    8 * 1024
}

fn default_authenticated_frame_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_compression_threshold() -> usize {
    256 * 1024
}

fn default_code_length() -> usize {
    6
}

fn default_attempts() -> u32 {
    3
}

fn default_code_ttl_seconds() -> u64 {
    300 // 5 minutes
}

fn default_backup_code_count() -> usize {
    10
}

fn default_client_id_max() -> i32 {
    2_000_000
}

fn default_chat_session_id_max() -> i32 {
    i32::MAX
}

fn default_batch_size() -> usize {
    5_000
}

/// Parse an optional variable, falling back to `default` when unset
fn var_or<T: FromStr>(name: &'static str, default: fn() -> T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default()),
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage = match env::var("STORAGE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "postgres" => StorageBackend::Postgres(DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", default_max_connections)?,
                min_connections: var_or("DATABASE_MIN_CONNECTIONS", default_min_connections)?,
            }),
            other => return Err(ConfigError::InvalidValue("STORAGE", other.to_string())),
        };

        let gateway_port = required_var("GATEWAY_PORT")?;

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: gateway_port
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("GATEWAY_PORT", gateway_port))?,
            },
            storage,
            tls: TlsConfig {
                cert_path: required_var("TLS_CERT_PATH")?,
                key_path: required_var("TLS_KEY_PATH")?,
            },
            rate_limit: RateLimitConfig {
                requests_per_second: var_or(
                    "RATE_LIMIT_REQUESTS_PER_SECOND",
                    default_requests_per_second,
                )?,
                ban_seconds: var_or("RATE_LIMIT_BAN_SECONDS", default_ban_seconds)?,
            },
            limits: FrameLimits {
                unauthenticated_frame_bytes: var_or(
                    "MAX_UNAUTHENTICATED_FRAME_BYTES",
                    default_unauthenticated_frame_bytes,
                )?,
                authenticated_frame_bytes: var_or(
                    "MAX_AUTHENTICATED_FRAME_BYTES",
                    default_authenticated_frame_bytes,
                )?,
                compression_threshold: var_or(
                    "COMPRESSION_THRESHOLD_BYTES",
                    default_compression_threshold,
                )?,
            },
            verification: VerificationConfig {
                code_length: var_or("VERIFICATION_CODE_LENGTH", default_code_length)?,
                attempts: var_or("VERIFICATION_ATTEMPTS", default_attempts)?,
                code_ttl_seconds: var_or("VERIFICATION_CODE_TTL_SECONDS", default_code_ttl_seconds)?,
                backup_code_count: var_or("BACKUP_CODE_COUNT", default_backup_code_count)?,
            },
            id_pool: IdPoolConfig {
                client_id_max: var_or("CLIENT_ID_MAX", default_client_id_max)?,
                chat_session_id_max: var_or("CHAT_SESSION_ID_MAX", default_chat_session_id_max)?,
                batch_size: var_or("ID_BATCH_SIZE", default_batch_size)?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
