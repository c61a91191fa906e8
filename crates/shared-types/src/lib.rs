//! # Shared Types
//!
//! Core identifier and fingerprint types used by every subsystem.
//!
//! ## Clusters
//!
//! - **Chain**: `Hash`, `BlockId`, `Pk`, `Stake`
//! - **State**: `RowHash`, `row_fingerprint`

pub mod entities;
pub mod fingerprint;

pub use entities::{BlockId, Hash, Pk, Stake, HASH_LEN, PK_LEN};
pub use fingerprint::{row_fingerprint, RowHash};
