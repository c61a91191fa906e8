pub mod clock;
pub mod memory_hub;
