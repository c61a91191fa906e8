//! # Out-of-Order Sequencer
//!
//! Messages from the network can reference blocks or rounds the local
//! node has not seen yet. The sequencer defers such messages until their
//! dependencies resolve, then releases them to the inner handler in
//! insertion order.
//!
//! A message has up to two dependencies: a block id (a block's `prev`)
//! and a round number (the round it votes in). Writes have neither and
//! pass straight through.

pub mod buffer;

pub use buffer::{Dependencies, Sequencer, SequencerHandler};
