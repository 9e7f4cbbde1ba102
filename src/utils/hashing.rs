//! Deterministic content hashing
//!
//! Stable identifiers and output checksums both derive from SHA-256 so the
//! same inputs always produce the same value across runs.

use sha2::{Digest, Sha256};

/// Length of the truncated channel id hash, in hex characters
const SHORT_HASH_LEN: usize = 12;

/// Generate a short stable identifier from input content
///
/// Truncated to 12 hex characters; collision risk is negligible at catalog
/// scale (low thousands of channels).
pub fn short_content_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..SHORT_HASH_LEN].to_string()
}

/// Full SHA-256 checksum over serialized output content
pub fn content_checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
