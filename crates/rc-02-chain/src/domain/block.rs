//! The block entity.
//!
//! A block is a proposer's vote in one round plus a batch of writes.
//! Immutable once signed: `sign` computes the VRF ticket and the
//! signature, and nothing may mutate the value afterwards — the block
//! (and the writes inside it) leave the process as frozen values.
//!
//! ## Canonical hash
//!
//! SHA-256 over big-endian integers and raw bytes, in field order:
//!
//! ```text
//! be64(round) ‖ be64(timestamp) ‖ prev ‖ finalized_prev ‖ pk
//! ‖ token ‖ proof ‖ for w in writes: w.hash()
//! ```
//!
//! The id is the hash with its first 8 bytes overwritten by the
//! big-endian round number.

use rc_01_ssi_state::Write;
use serde::{Deserialize, Serialize};
use shared_crypto::{sha256, vrf_verify, Ed25519PublicKey, Identity};
use shared_types::{BlockId, Hash, Pk};

/// A proposer's round vote plus a batch of writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Round this block votes in. Round 0 is reserved for genesis.
    pub round: u64,
    /// Microseconds since the Unix epoch on the proposer's clock.
    pub timestamp: u64,
    /// Block this one builds on.
    pub prev: BlockId,
    /// Most recent ancestor the proposer believes is final.
    pub finalized_prev: BlockId,
    /// Proposer's signing public key.
    pub pk: Pk,
    /// VRF output over the lottery seed.
    pub token: Vec<u8>,
    /// VRF proof for `token`.
    pub proof: Vec<u8>,
    /// State writes to apply in order.
    pub writes: Vec<Write>,
    /// Ed25519 signature over the content hash.
    pub signature: Vec<u8>,
}

impl Block {
    /// Construct the genesis block: round 0, zero ids, unsigned.
    pub fn genesis(writes: Vec<Write>, timestamp: u64) -> Self {
        Self {
            round: 0,
            timestamp,
            writes,
            ..Self::default()
        }
    }

    /// Canonical content hash over every field except the signature.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.round.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(self.prev.as_bytes());
        buf.extend_from_slice(self.finalized_prev.as_bytes());
        buf.extend_from_slice(self.pk.as_bytes());
        buf.extend_from_slice(&self.token);
        buf.extend_from_slice(&self.proof);
        for write in &self.writes {
            buf.extend_from_slice(&write.hash());
        }
        sha256(&[&buf])
    }

    /// The block id: content hash with the round spliced into the first
    /// 8 bytes, making id keyspaces range-indexable by round.
    pub fn id(&self) -> BlockId {
        BlockId::from_hash(self.hash(), self.round)
    }

    /// The VRF lottery seed: `finalized_prev ‖ pk ‖ be64(round)`.
    ///
    /// Mixing in `finalized_prev` ties the ticket to long-term randomness
    /// that cannot be ground out for future rounds, and mixing in the pk
    /// gives every identity its own ticket.
    pub fn vrf_seed(&self) -> Vec<u8> {
        let mut seed = Vec::with_capacity(72);
        seed.extend_from_slice(self.finalized_prev.as_bytes());
        seed.extend_from_slice(self.pk.as_bytes());
        seed.extend_from_slice(&self.round.to_be_bytes());
        seed
    }

    /// Draw the VRF ticket and sign. The block is frozen afterwards.
    pub fn sign(&mut self, identity: &Identity) {
        self.pk = identity.pk();
        let (token, proof) = identity.prove(&self.vrf_seed());
        self.token = token.to_vec();
        self.proof = proof.0;
        self.signature = identity.sign(&self.hash()).to_vec();
    }

    /// Check the signature against the embedded pk.
    pub fn verify_signature(&self) -> bool {
        let Ok(pk) = Ed25519PublicKey::from_bytes(*self.pk.as_bytes()) else {
            return false;
        };
        pk.verify_slice(&self.hash(), &self.signature).is_ok()
    }

    /// Check the VRF ticket under the token pk the proposer committed to
    /// chain state.
    pub fn verify_token(&self, token_pk: &Ed25519PublicKey) -> bool {
        vrf_verify(token_pk, &self.vrf_seed(), &self.token, &self.proof).is_ok()
    }

    /// True for the protocol-constant round-0 block.
    pub fn is_genesis(&self) -> bool {
        self.round == 0 && self.prev.is_zero()
    }
}
