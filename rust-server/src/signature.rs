//! WeChat push signature verification.
//!
//! The platform signs every push with SHA-1 over the shared token and the
//! request-supplied `timestamp` and `nonce`:
//!
//! 1. sort the three strings lexicographically
//! 2. concatenate them
//! 3. SHA-1 the result and hex-encode it (lowercase)
//!
//! The hex digest arrives as the `signature` query parameter.

use sha1::{Digest, Sha1};
use tracing::debug;

/// Length of a hex-encoded SHA-1 digest.
const SIGNATURE_HEX_LEN: usize = 40;

/// Compute the signature the platform would send for these inputs.
///
/// Useful for signing test requests and for clients replaying pushes.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify a push signature.
///
/// # Arguments
///
/// * `signature` - The `signature` query parameter
/// * `timestamp` - The `timestamp` query parameter
/// * `nonce` - The `nonce` query parameter
/// * `token` - The token configured on the platform
///
/// # Returns
///
/// `true` only if `signature` equals the expected lowercase hex digest.
/// The comparison is case-sensitive and runs in constant time.
pub fn check_signature(signature: &str, timestamp: &str, nonce: &str, token: &str) -> bool {
    let expected = compute_signature(token, timestamp, nonce);
    let valid = constant_time_compare(expected.as_bytes(), signature.as_bytes());

    if !valid {
        debug!(
            expected_length = SIGNATURE_HEX_LEN,
            actual_length = signature.len(),
            "wechat_signature_mismatch"
        );
    }

    valid
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
