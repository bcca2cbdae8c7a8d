//! # chat-db
//!
//! Persistence layer implementing the `chat-core` repository traits.
//!
//! ## Overview
//!
//! - PostgreSQL repositories via SQLx (`Pg*Repository`)
//! - Connection pool management and schema bootstrap
//! - Database models with SQLx `FromRow` derives and entity mappers
//! - [`MemoryStore`], a process-local implementation of every trait
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_db::{create_pool, ensure_schema, DatabaseConfig, PgAccountRepository};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::default()).await?;
//!     ensure_schema(&pool).await?;
//!     let accounts = PgAccountRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use pool::{create_pool, ensure_schema, DatabaseConfig, PgPool};
pub use repositories::{
    PgAccountRepository, PgChatSessionRepository, PgDeviceRepository, PgMessageRepository,
};
