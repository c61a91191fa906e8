pub mod broadcast;
pub mod clock;
