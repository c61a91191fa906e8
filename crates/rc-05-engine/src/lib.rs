//! # Engine
//!
//! Ties the subsystems into a running node: a clock drives rounds, a
//! broadcast port carries blocks and writes between peers, the sequencer
//! buffers out-of-order arrivals, and the chain and mempool hold the
//! replicated state.
//!
//! ## Structure
//!
//! - `domain`: the `Message` wire envelope
//! - `ports`: `Clock` and `Broadcast` contracts
//! - `adapters`: wall-clock and scripted clocks, in-process broadcast hub
//! - `service`: the engine lifecycle

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod service;

pub use adapters::clock::{RoundClock, ScriptedClock};
pub use adapters::memory_hub::{MemoryBroadcast, MemoryHub};
pub use domain::message::Message;
pub use errors::EngineError;
pub use ports::broadcast::Broadcast;
pub use ports::clock::Clock;
pub use service::engine::Engine;
