//! Domain module for the SSI state engine.
//!
//! - `write`: the committed transactional diff carried in blocks
//! - `state`: snapshot store, transactions, the status oracle
//! - `errors`: conflict and replay errors

pub mod errors;
pub mod state;
pub mod write;
