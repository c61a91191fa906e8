//! The committed transactional diff carried in blocks.
//!
//! A `Write` freezes one committed SSI transaction: its start and commit
//! timestamps, the fingerprints of every row it read, the written rows
//! with their full key and value, the proposer's public key, a random
//! nonce, and a signature over the content hash.
//!
//! ## Canonical hash
//!
//! SHA-256 over big-endian integers and raw byte strings, in field order:
//!
//! ```text
//! be64(time_start) ‖ be64(time_commit)
//! ‖ for r in reads (ascending):  be64(r)
//! ‖ for (r, kv) in writes (ascending): be64(r) ‖ kv.key ‖ kv.value
//! ‖ pk ‖ nonce
//! ```
//!
//! Absent fields contribute zero bytes, so the hash of the all-zero empty
//! write is SHA-256 of sixteen zero bytes. The trailing `pk ‖ nonce` is
//! unframed; a signed write always carries a 32-byte pk and a 16-byte
//! nonce, so the split is fixed. The proposer pk and the nonce are inside
//! the hash, and the signature is over the hash, so the signature covers
//! both. The nonce exists solely to give semantically identical payloads
//! distinct content hashes.

use crate::domain::errors::SsiError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_crypto::{sha256, Ed25519PublicKey, Identity};
use shared_types::{Hash, RowHash};
use std::collections::{BTreeMap, BTreeSet};

/// Length of the anti-collision nonce in bytes.
pub const NONCE_LEN: usize = 16;

/// A write is identified by its content hash.
pub type WriteId = Hash;

/// A written row: the full key and the new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// One committed SSI transaction, frozen for transport.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    /// Oracle counter value when the transaction began.
    pub time_start: u64,
    /// Oracle counter value assigned at commit.
    pub time_commit: u64,
    /// Fingerprints of every row the transaction read.
    pub reads: BTreeSet<RowHash>,
    /// Written rows, keyed by fingerprint.
    pub writes: BTreeMap<RowHash, KeyValue>,
    /// Proposer's signing public key (empty until signed).
    pub pk: Vec<u8>,
    /// Random nonce (empty until signed).
    pub nonce: Vec<u8>,
    /// Ed25519 signature over the content hash (empty until signed).
    pub signature: Vec<u8>,
}

impl Write {
    /// Canonical content hash over every field except the signature.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&self.time_start.to_be_bytes());
        buf.extend_from_slice(&self.time_commit.to_be_bytes());
        for row in &self.reads {
            buf.extend_from_slice(&row.to_be_bytes());
        }
        for (row, kv) in &self.writes {
            buf.extend_from_slice(&row.to_be_bytes());
            buf.extend_from_slice(&kv.key);
            buf.extend_from_slice(&kv.value);
        }
        buf.extend_from_slice(&self.pk);
        buf.extend_from_slice(&self.nonce);
        sha256(&[&buf])
    }

    /// The write id: its content hash.
    pub fn id(&self) -> WriteId {
        self.hash()
    }

    /// Freeze the write: set pk, draw a nonce if none is present, and
    /// sign the content hash. After signing the value must not change.
    pub fn sign(&mut self, identity: &Identity) {
        self.pk = identity.pk().as_bytes().to_vec();
        if self.nonce.is_empty() {
            let mut nonce = [0u8; NONCE_LEN];
            rand::thread_rng().fill_bytes(&mut nonce);
            self.nonce = nonce.to_vec();
        }
        self.signature = identity.sign(&self.hash()).to_vec();
    }

    /// Check the signature against the embedded pk.
    pub fn verify_signature(&self) -> bool {
        let Ok(pk_bytes) = <[u8; 32]>::try_from(self.pk.as_slice()) else {
            return false;
        };
        let Ok(pk) = Ed25519PublicKey::from_bytes(pk_bytes) else {
            return false;
        };
        pk.verify_slice(&self.hash(), &self.signature).is_ok()
    }

    /// True when the transaction wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Replay-conflict check against recorded row commit timestamps.
    ///
    /// For every row this write read, a commit newer than this write's
    /// start-timestamp means the snapshot it ran against is stale.
    pub(crate) fn check_against(
        &self,
        row_commits: &std::collections::HashMap<RowHash, u64>,
    ) -> Result<(), SsiError> {
        for row in &self.reads {
            if let Some(&committed) = row_commits.get(row) {
                if committed > self.time_start {
                    return Err(SsiError::ApplyConflict {
                        row: *row,
                        committed,
                        start: self.time_start,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::row_fingerprint;

    #[test]
    fn test_empty_write_hash_vector() {
        let write = Write::default();
        assert_eq!(&write.hash()[..4], &[0x37, 0x47, 0x08, 0xff]);
    }

    #[test]
    fn test_commit_timestamp_hash_vector() {
        let write = Write {
            time_commit: 1,
            ..Write::default()
        };
        assert_eq!(&write.hash()[..4], &[0x7c, 0x3c, 0xcd, 0x10]);
    }

    #[test]
    fn test_start_timestamp_hash_vector() {
        let write = Write {
            time_start: 1,
            time_commit: 1,
            ..Write::default()
        };
        assert_eq!(&write.hash()[..4], &[0x53, 0x2d, 0xea, 0xbf]);
    }

    #[test]
    fn test_every_field_feeds_the_hash() {
        let base = Write::default();
        let mut with_read = base.clone();
        with_read.reads.insert(row_fingerprint(b"k"));
        let mut with_write = base.clone();
        with_write.writes.insert(
            row_fingerprint(b"k"),
            KeyValue {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            },
        );
        // signed writes carry a 32-byte pk and a 16-byte nonce
        let mut with_pk = base.clone();
        with_pk.pk = vec![1; 32];
        let mut with_nonce = base.clone();
        with_nonce.nonce = vec![1; NONCE_LEN];

        let hashes = [
            base.hash(),
            with_read.hash(),
            with_write.hash(),
            with_pk.hash(),
            with_nonce.hash(),
        ];
        for i in 0..hashes.len() {
            for j in (i + 1)..hashes.len() {
                assert_ne!(hashes[i], hashes[j], "fields {i} and {j} collided");
            }
        }
    }

    #[test]
    fn test_signature_excluded_from_hash() {
        let mut write = Write::default();
        let before = write.hash();
        write.signature = vec![9; 64];
        assert_eq!(before, write.hash());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let identity = Identity::test_identity(1);
        let mut write = Write::default();
        write.writes.insert(
            row_fingerprint(b"k"),
            KeyValue {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            },
        );
        write.sign(&identity);
        assert!(write.verify_signature());
    }

    #[test]
    fn test_mutation_after_sign_fails_verification() {
        let identity = Identity::test_identity(2);
        let mut write = Write::default();
        write.sign(&identity);
        write.time_commit = 99;
        assert!(!write.verify_signature());
    }

    #[test]
    fn test_unsigned_write_fails_verification() {
        assert!(!Write::default().verify_signature());
    }

    #[test]
    fn test_nonce_distinguishes_identical_payloads() {
        let identity = Identity::test_identity(3);
        let mut a = Write::default();
        let mut b = Write::default();
        a.sign(&identity);
        b.sign(&identity);
        assert_ne!(a.id(), b.id());
    }
}
