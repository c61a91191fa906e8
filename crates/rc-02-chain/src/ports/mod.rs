//! Port contracts of the chain subsystem.

pub mod store;
