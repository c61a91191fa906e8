//! Error types for the mempool.

use thiserror::Error;

/// Errors raised when a write is offered to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MempoolError {
    /// The write's signature does not verify under its embedded pk.
    #[error("Invalid write signature")]
    InvalidWriteSignature,

    /// A write with this id is already pooled.
    #[error("Write already in pool")]
    AlreadyInPool,
}
