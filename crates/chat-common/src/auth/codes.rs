//! One-time codes

use rand::rngs::OsRng;
use rand::Rng;

const BACKUP_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const BACKUP_CODE_LEN: usize = 10;

/// Numeric code mailed during email verification
pub fn generate_verification_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Alphanumeric backup code; ambiguous glyphs (0/O, 1/I) are excluded
pub fn generate_backup_code() -> String {
    let mut rng = OsRng;
    (0..BACKUP_CODE_LEN)
        .map(|_| char::from(BACKUP_ALPHABET[rng.gen_range(0..BACKUP_ALPHABET.len())]))
        .collect()
}
