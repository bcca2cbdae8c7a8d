//! Credential handling: hashing, policy checks, and one-time codes

mod codes;
mod password;
mod policy;

pub use codes::{generate_backup_code, generate_verification_code};
pub use password::{hash_password, verify_password};
pub use policy::{
    estimate_entropy_bits, validate_email, validate_password_strength, validate_username,
    MIN_PASSWORD_ENTROPY_BITS,
};
