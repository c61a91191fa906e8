//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur in signature and VRF operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The byte string is not a valid Ed25519 public key.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature verification failed.
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// A signature or proof had the wrong length.
    #[error("Malformed signature or proof: expected {expected} bytes, got {got}")]
    MalformedBytes { expected: usize, got: usize },

    /// An identity seed had the wrong length.
    #[error("Identity seed must be {expected} bytes, got {got}")]
    BadSeedLength { expected: usize, got: usize },
}
