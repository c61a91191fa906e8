//! # Block and Chain
//!
//! The block data model, signature and ticket verification, the
//! rank-weighted longest-chain rule, and the append pipeline.
//!
//! ## Structure
//!
//! - `domain`: `Block`, `Stakes`, state-key conventions, fork choice, the
//!   `Chain` append/mint/walk pipeline
//! - `ports`: the `ChainStore` storage contract
//! - `adapters`: in-memory `ChainStore` backend

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod ports;

pub use adapters::memory::MemoryStore;
pub use domain::block::Block;
pub use domain::chain::{AppendOutcome, Chain};
pub use domain::keys;
pub use domain::stakes::Stakes;
pub use errors::ChainError;
pub use ports::store::ChainStore;

/// Default points-per-round constant of the longest-chain rule.
pub const DEFAULT_WEIGHT_POINTS: u64 = 1000;
