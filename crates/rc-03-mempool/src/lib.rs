//! # Mempool
//!
//! Local buffer of signed but unincluded writes. Deduplicates by write
//! id, gates on signature validity, and hands out conflict-free batches
//! for block inclusion.

pub mod errors;
pub mod pool;

pub use errors::MempoolError;
pub use pool::{PickOutcome, WritePool};
