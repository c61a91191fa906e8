//! Row fingerprints for the SSI read/write sets.
//!
//! Keys are reduced to a 64-bit SipHash-1-3 fingerprint before entering a
//! transaction's read or write set. Fingerprints travel inside signed
//! writes, so the function must be stable across nodes and releases —
//! `std::hash::DefaultHasher` gives no such guarantee, SipHash with pinned
//! keys does.
//!
//! A fingerprint collision can make two unrelated keys look like the same
//! row to the conflict oracle. The consequence is a spurious conflict
//! (a transaction aborts that did not have to), never corruption: values
//! are always stored under the full key.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// 64-bit fingerprint of a state key.
pub type RowHash = u64;

/// Fingerprint a key for the read/write sets.
pub fn row_fingerprint(key: &[u8]) -> RowHash {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(key);
    hasher.finish()
}
