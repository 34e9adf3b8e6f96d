//! CLI command implementations.

mod display;

pub mod analyze;
pub mod cycles;
pub mod stats;
pub mod update;
