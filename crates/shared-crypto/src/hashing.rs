//! SHA-256 helpers for canonical content hashes.

use sha2::{Digest, Sha256};
use shared_types::Hash;

/// Hash the concatenation of `parts` with SHA-256.
pub fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
