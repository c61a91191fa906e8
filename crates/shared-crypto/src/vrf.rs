//! Verifiable Random Function (VRF) for the per-round minting lottery.
//!
//! A VRF produces a pseudorandom output that can be publicly verified but
//! not predicted without the secret key. Here it turns each (identity,
//! round) pair into a random ticket that ranks the round's blocks.
//!
//! Construction: `token = H(sign(token_sk, tag ‖ seed))`, with the
//! deterministic Ed25519 signature doubling as the proof. Ed25519 signing
//! is deterministic for a given (key, message) pair, which is exactly the
//! property a VRF needs: the same seed always yields the same token, and
//! nobody without the secret key can compute it.
//!
//! The proof carries, after the 64-byte signature, a 32-byte binding hash
//! over the token public key and the seed. The binding pins the proof to
//! the key it was made under, so a proof cannot be replayed as evidence
//! for a different identity's ticket.

use crate::{sha256, CryptoError, Ed25519KeyPair, Ed25519PublicKey, SIGNATURE_LEN};

/// VRF output length (bytes).
pub const TOKEN_LEN: usize = 32;

/// VRF proof length: 64-byte signature plus 32-byte key binding.
pub const PROOF_LEN: usize = SIGNATURE_LEN + 32;

const TAG_INPUT: &[u8] = b"rondo.vrf.input";
const TAG_BIND: &[u8] = b"rondo.vrf.bind";
const TAG_OUT: &[u8] = b"rondo.vrf.out";

/// A VRF proof: the raw 96 bytes carried in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrfProof(pub Vec<u8>);

/// Evaluate the VRF over `seed` under `token_kp`.
///
/// Returns `(token, proof)` with `token` 32 bytes and `proof` 96 bytes.
pub fn vrf_prove(token_kp: &Ed25519KeyPair, seed: &[u8]) -> ([u8; TOKEN_LEN], VrfProof) {
    let sig = token_kp.sign(&[TAG_INPUT, seed].concat());
    let binding = sha256(&[TAG_BIND, token_kp.public_key().as_bytes(), seed]);

    let mut proof = Vec::with_capacity(PROOF_LEN);
    proof.extend_from_slice(sig.as_bytes());
    proof.extend_from_slice(&binding);

    let token = sha256(&[TAG_OUT, sig.as_bytes()]);
    (token, VrfProof(proof))
}

/// Verify that `token` is the VRF output for `seed` under `token_pk`.
pub fn vrf_verify(
    token_pk: &Ed25519PublicKey,
    seed: &[u8],
    token: &[u8],
    proof: &[u8],
) -> Result<(), CryptoError> {
    if proof.len() != PROOF_LEN {
        return Err(CryptoError::MalformedBytes {
            expected: PROOF_LEN,
            got: proof.len(),
        });
    }
    let (sig, binding) = proof.split_at(SIGNATURE_LEN);

    token_pk.verify_slice(&[TAG_INPUT, seed].concat(), sig)?;

    let expected_binding = sha256(&[TAG_BIND, token_pk.as_bytes(), seed]);
    if binding != expected_binding {
        return Err(CryptoError::SignatureVerificationFailed);
    }

    let expected_token = sha256(&[TAG_OUT, sig]);
    if token != expected_token {
        return Err(CryptoError::SignatureVerificationFailed);
    }
    Ok(())
}
