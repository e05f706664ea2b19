//! Shared-secret comparison for the API token.

use sha2::{Digest, Sha256};

/// Compare a presented token with the expected one.
///
/// Both sides are hashed first so the comparison always runs over 32 bytes,
/// whatever the input lengths; the fold never short-circuits.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
