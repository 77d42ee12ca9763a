/// Email verification codes
///
/// Signup issues a short numeric code that the user types back into the
/// verification form. Only the SHA-256 hash of the code is persisted, next to
/// an expiry timestamp, so a database read never reveals a usable code.
///
/// # Format
///
/// Codes are exactly six ASCII digits (`000000`-`999999`), generated with
/// `rand::thread_rng()`.
///
/// # Example
///
/// ```
/// use securewrap_shared::auth::verification::{generate_code, verify_code};
///
/// let (code, hash) = generate_code();
/// assert_eq!(code.len(), 6);
/// assert!(verify_code(&code, &hash));
/// assert!(!verify_code("not-it", &hash));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Number of digits in a verification code
pub const CODE_LENGTH: usize = 6;

/// Generates a new verification code
///
/// # Returns
///
/// Tuple of (plaintext_code, sha256_hash)
pub fn generate_code() -> (String, String) {
    let mut rng = rand::thread_rng();
    let code: String = (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    let hash = hash_code(&code);

    (code, hash)
}

/// Hashes a verification code using SHA-256
///
/// Returns the lowercase hex digest (64 characters). Surrounding whitespace
/// is ignored so a pasted code still matches.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Checks that a submitted code has the expected shape
///
/// Malformed input is rejected before any database lookup.
pub fn is_valid_code_format(code: &str) -> bool {
    let code = code.trim();
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Verifies a submitted code against a stored hash
///
/// The hashes are compared in constant time.
pub fn verify_code(code: &str, stored_hash: &str) -> bool {
    if !is_valid_code_format(code) {
        return false;
    }

    constant_time_compare(&hash_code(code), stored_hash)
}

/// Constant-time string comparison
///
/// Runs over the full length of equal-length inputs regardless of where they
/// differ.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
