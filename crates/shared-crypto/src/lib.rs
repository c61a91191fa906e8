//! # Shared Crypto
//!
//! Cryptographic primitives for the consensus core.
//!
//! - `signatures`: Ed25519 signing wrappers with zeroized key material
//! - `vrf`: signature-derived verifiable random function
//! - `identity`: a participant's long-term key material
//! - `hashing`: SHA-256 helpers for canonical content hashes

pub mod errors;
pub mod hashing;
pub mod identity;
pub mod signatures;
pub mod vrf;

pub use errors::CryptoError;
pub use hashing::sha256;
pub use identity::{Identity, IDENTITY_SEED_LEN};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, SIGNATURE_LEN};
pub use vrf::{vrf_prove, vrf_verify, VrfProof, PROOF_LEN, TOKEN_LEN};
