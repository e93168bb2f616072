//! Room code generation and validation
//!
//! Codes are short, shareable, and read aloud over voice chat, so the
//! alphabet drops the characters people confuse: 0/O, 1/I/L.

use crate::error::AppError;
use rand::Rng;

/// Length of every room code
pub const CODE_LENGTH: usize = 5;

/// Allowed code characters (uppercase, visually unambiguous)
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a random room code from the allowed alphabet
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Normalize client input to the canonical uppercase form
///
/// Accepts lowercase input (codes are case-insensitive at the edges) and
/// rejects anything that is not exactly [`CODE_LENGTH`] alphabet characters.
pub fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code: String = raw.trim().to_ascii_uppercase();
    if code.len() != CODE_LENGTH {
        return Err(AppError::Validation(format!(
            "Room code must be {} characters, got {}",
            CODE_LENGTH,
            code.len()
        )));
    }
    if !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return Err(AppError::Validation(format!(
            "Room code contains characters outside the allowed alphabet: {}",
            code
        )));
    }
    Ok(code)
}
