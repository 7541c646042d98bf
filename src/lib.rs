// Library exports for the Battlesnake benchmark harness
// Both binaries (the sweep driver and the comparison tool) are thin wrappers over these modules

pub mod aggregator;
pub mod compare;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod store;
pub mod supervisor;
pub mod sweep;
pub mod types;

pub use error::{BenchError, Result};
