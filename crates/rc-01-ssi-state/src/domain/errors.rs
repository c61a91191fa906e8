//! Error types for the SSI state engine.

use shared_types::RowHash;
use thiserror::Error;

/// Errors raised by the status oracle and the replay path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SsiError {
    /// A row read by the transaction was overwritten by a commit newer
    /// than the transaction's start-timestamp.
    #[error("Apply conflict on row {row:#018x}: committed at {committed}, transaction started at {start}")]
    ApplyConflict {
        row: RowHash,
        committed: u64,
        start: u64,
    },

    /// The write's id is already present in the state's applied set.
    /// During mempool picking this is an expected skip signal; during
    /// chain reconstruction it means the chain carries a duplicate.
    #[error("Write already applied")]
    AlreadyApplied,
}
