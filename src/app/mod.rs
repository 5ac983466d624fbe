//! Application glue module
//!
//! Configuration, a transcript mirror for text front ends, and the sample
//! program run by the headless runner.

mod config;
pub mod sample;
mod transcript;

pub use config::{Config, ConfigError, WindowConfig};
pub use transcript::Transcript;
