//! A participant's long-term key material.
//!
//! An identity holds two Ed25519 keypairs: a signing pair whose public key
//! is the participant's identifier (`Pk`), and a token pair that feeds the
//! VRF lottery. The token public key is committed to chain state so peers
//! can verify tickets; the signing key never leaves the process.

use crate::{vrf_prove, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, VrfProof, CryptoError};
use shared_types::Pk;

/// Length of an identity seed: 32 bytes per keypair.
pub const IDENTITY_SEED_LEN: usize = 64;

/// A participant: signing keypair plus VRF token keypair.
pub struct Identity {
    signing: Ed25519KeyPair,
    token: Ed25519KeyPair,
}

impl Identity {
    /// Derive an identity from a 64-byte seed.
    ///
    /// Bytes 0..32 seed the signing key, 32..64 the token key. The mapping
    /// is deterministic so tests can reproduce identities.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        if seed.len() != IDENTITY_SEED_LEN {
            return Err(CryptoError::BadSeedLength {
                expected: IDENTITY_SEED_LEN,
                got: seed.len(),
            });
        }
        let mut signing_seed = [0u8; 32];
        let mut token_seed = [0u8; 32];
        signing_seed.copy_from_slice(&seed[..32]);
        token_seed.copy_from_slice(&seed[32..]);
        Ok(Self {
            signing: Ed25519KeyPair::from_seed(signing_seed),
            token: Ed25519KeyPair::from_seed(token_seed),
        })
    }

    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self {
            signing: Ed25519KeyPair::generate(),
            token: Ed25519KeyPair::generate(),
        }
    }

    /// Shorthand used throughout the tests: identity `n` from a constant
    /// seed. The two seed halves differ so the signing and token keys do.
    pub fn test_identity(n: u8) -> Self {
        let mut seed = [n; IDENTITY_SEED_LEN];
        seed[32..].fill(n.wrapping_add(0x80));
        Self::from_seed(&seed).expect("seed length is fixed")
    }

    /// The public identifier: the signing public key.
    pub fn pk(&self) -> Pk {
        Pk(*self.signing.public_key().as_bytes())
    }

    /// The token public key committed to chain state.
    pub fn token_pk(&self) -> Ed25519PublicKey {
        self.token.public_key()
    }

    /// Sign a message under the signing key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing.sign(message)
    }

    /// Evaluate the VRF lottery over `seed`.
    pub fn prove(&self, seed: &[u8]) -> ([u8; 32], VrfProof) {
        vrf_prove(&self.token, seed)
    }
}
