//! PKCE (Proof Key for Code Exchange) utilities for the authorization endpoint
//!
//! Validates RFC 7636 `code_challenge` parameters on incoming authorization
//! requests. Only the `S256` method is accepted; `plain` is rejected because
//! it defeats the purpose of the binding for public clients.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Minimum length for a code_challenge as per RFC 7636
pub const CODE_CHALLENGE_MIN_LENGTH: usize = 43;

/// Maximum length for a code_challenge as per RFC 7636
pub const CODE_CHALLENGE_MAX_LENGTH: usize = 128;

/// The only supported PKCE method
pub const PKCE_METHOD_S256: &str = "S256";

/// Check whether a challenge method is supported.
///
/// An empty method is treated as `S256` (the default when a client omits
/// the parameter). `plain` and anything else is unsupported.
pub fn is_supported_method(method: &str) -> bool {
    method.is_empty() || method == PKCE_METHOD_S256
}

/// Validate code_challenge format according to RFC 7636
///
/// The challenge must be 43–128 characters long and contain only
/// base64url characters: [A-Z] / [a-z] / [0-9] / "-" / "_"
pub fn validate_code_challenge(challenge: &str) -> bool {
    let len = challenge.len();

    if !(CODE_CHALLENGE_MIN_LENGTH..=CODE_CHALLENGE_MAX_LENGTH).contains(&len) {
        return false;
    }

    challenge
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Compute the S256 challenge for a verifier: BASE64URL(SHA256(verifier))
#[allow(dead_code)]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
