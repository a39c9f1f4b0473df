//! Command-line interface for biocfetch.

mod commands;
pub mod helpers;
pub mod icons;
pub mod progress;

pub use commands::{is_verbose, run};
