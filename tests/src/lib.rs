//! # Rondo-Chain Test Suite
//!
//! Unified test crate for scenarios that cross subsystem boundaries:
//! multi-node propagation, out-of-order delivery, conflicting writes,
//! finality, and convergence.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-subsystem consensus scenarios
//!     ├── consensus_flows.rs   # In-process multi-node scenarios
//!     └── network_flows.rs     # Full nodes over real TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rc-tests
//!
//! # By category
//! cargo test -p rc-tests integration::consensus_flows::
//! cargo test -p rc-tests integration::network_flows::
//! ```

pub mod integration;
