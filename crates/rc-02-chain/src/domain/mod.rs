//! Domain module for the chain subsystem.
//!
//! - `block`: the immutable block entity and its crypto operations
//! - `stakes`: per-block vote tally and the finality threshold
//! - `keys`: state-key conventions (stake balances, token pks)
//! - `fork_choice`: rank-derived weights and tip selection
//! - `chain`: the append pipeline, minting, and ancestry walks

pub mod block;
pub mod chain;
pub mod fork_choice;
pub mod keys;
pub mod stakes;
