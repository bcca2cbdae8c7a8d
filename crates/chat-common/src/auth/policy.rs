//! Credential policy checks for account creation and profile changes

use std::collections::HashSet;
use validator::ValidateEmail;

use crate::error::AppError;

/// Passwords estimated below this are rejected
pub const MIN_PASSWORD_ENTROPY_BITS: f64 = 45.0;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 254;

/// Validate a display name
///
/// # Errors
/// Returns a validation error describing the first rule broken
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(AppError::validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters long"
        )));
    }

    if len > MAX_USERNAME_LEN {
        return Err(AppError::validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters long"
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AppError::validation(
            "Username can only contain letters, numbers, '_', '-' and '.'",
        ));
    }

    Ok(())
}

/// Validate an email address
///
/// # Errors
/// Returns a validation error if the address is malformed
pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() > MAX_EMAIL_LEN || !email.validate_email() {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(())
}

/// Rough strength estimate: length times log2 of the character pool.
///
/// Repeated characters only count twice at most, so `Aaaaaaaaaa1`
/// scores as a short password.
pub fn estimate_entropy_bits(password: &str) -> f64 {
    let mut pool = 0u32;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        pool += 26;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        pool += 26;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        pool += 10;
    }
    if password.chars().any(|c| c.is_ascii_punctuation() || c == ' ') {
        pool += 33;
    }
    if password.chars().any(|c| !c.is_ascii()) {
        pool += 100;
    }
    if pool == 0 {
        return 0.0;
    }

    let distinct = password.chars().collect::<HashSet<_>>().len();
    let effective_len = password.chars().count().min(distinct * 2);
    effective_len as f64 * f64::from(pool).log2()
}

/// Validate password strength
///
/// Requires 8 to 128 characters, at least one uppercase letter, one
/// lowercase letter and one digit, and an entropy estimate of at least
/// [`MIN_PASSWORD_ENTROPY_BITS`].
///
/// # Errors
/// Returns a validation error if the password doesn't meet requirements
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters long"
        )));
    }

    if !password.chars().any(char::is_uppercase) {
        return Err(AppError::validation(
            "Password must contain at least one uppercase letter",
        ));
    }

    if !password.chars().any(char::is_lowercase) {
        return Err(AppError::validation(
            "Password must contain at least one lowercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("Password must contain at least one digit"));
    }

    if estimate_entropy_bits(password) < MIN_PASSWORD_ENTROPY_BITS {
        return Err(AppError::validation("Password is too predictable"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<(), AppError>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_the.builder-2").is_ok());
        assert!(message(validate_username("ab")).contains("at least"));
        assert!(message(validate_username(&"a".repeat(33))).contains("at most"));
        assert!(message(validate_username("white space")).contains("only contain"));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name+tag@domain.co.uk").is_ok());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("test@").is_err());
    }

    #[test]
    fn test_validate_password_strength_valid() {
        assert!(validate_password_strength("SecurePass1").is_ok());
        assert!(validate_password_strength("MyP@ssw0rd!").is_ok());
    }

    #[test]
    fn test_validate_password_strength_rules() {
        assert!(message(validate_password_strength("Short1")).contains("8 characters"));
        assert!(message(validate_password_strength("lowercase123")).contains("uppercase"));
        assert!(message(validate_password_strength("UPPERCASE123")).contains("lowercase"));
        assert!(message(validate_password_strength("NoDigitsHere")).contains("digit"));
    }

    #[test]
    fn test_repetitive_password_rejected() {
        assert!(message(validate_password_strength("Aaaaaaaaaaa1")).contains("predictable"));
    }

    #[test]
    fn test_entropy_grows_with_pool() {
        assert!(estimate_entropy_bits("abcdefgh") < estimate_entropy_bits("abcDEF12"));
        assert!(estimate_entropy_bits("") <= 0.0);
    }
}
