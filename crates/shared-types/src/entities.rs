//! # Core Domain Entities
//!
//! Identifier newtypes shared across the workspace.
//!
//! A block id is the content hash of the block with the first 8 bytes
//! overwritten by the big-endian round number, which makes id keyspaces
//! range-indexable by round. The genesis id therefore starts with 8 zero
//! bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a content hash in bytes.
pub const HASH_LEN: usize = 32;

/// Length of an Ed25519 public key in bytes.
pub const PK_LEN: usize = 32;

/// A 32-byte SHA-256 content hash.
pub type Hash = [u8; HASH_LEN];

/// A stake balance. Stake grants minting rights and counts for finality.
pub type Stake = u64;

/// Identifier of a block: its content hash with the leading 8 bytes
/// replaced by the big-endian round number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockId(pub Hash);

impl BlockId {
    /// The all-zero id, used as the `prev` of genesis.
    pub const ZERO: BlockId = BlockId([0u8; HASH_LEN]);

    /// Build an id from a content hash and the block's round number.
    pub fn from_hash(mut hash: Hash, round: u64) -> Self {
        hash[..8].copy_from_slice(&round.to_be_bytes());
        Self(hash)
    }

    /// The round number encoded in the leading 8 bytes.
    pub fn round(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }

    /// True for the all-zero id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // round prefix plus the first 4 hash bytes is enough to tell ids apart in logs
        write!(f, "{}-", self.round())?;
        for b in &self.0[8..12] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A participant's public identifier: the 32-byte signing public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pk(pub [u8; PK_LEN]);

impl Pk {
    pub fn as_bytes(&self) -> &[u8; PK_LEN] {
        &self.0
    }
}

impl fmt::Debug for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pk({})", self)
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; PK_LEN]> for Pk {
    fn from(bytes: [u8; PK_LEN]) -> Self {
        Self(bytes)
    }
}
