//! # SSI State Engine
//!
//! A key-value store whose transactions are serialisable under snapshot
//! isolation, following the status-oracle construction of Yabandeh (2012).
//!
//! Transactions begin with a start-timestamp drawn from a monotonic
//! counter and read a consistent snapshot. At commit the oracle checks,
//! for every row the transaction read, whether another transaction
//! committed a write to that row after this transaction's start. If so
//! the commit is rejected; otherwise the counter advances and every
//! written row records the new commit-timestamp.
//!
//! Committed transactions are frozen into [`Write`] values — the payload
//! blocks carry — and can be replayed onto an empty state with their
//! recorded timestamps to reconstruct the chain state at any block.

pub mod domain;

pub use domain::errors::SsiError;
pub use domain::state::{State, Tx, TxData};
pub use domain::write::{KeyValue, Write, WriteId, NONCE_LEN};
