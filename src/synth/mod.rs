//! Synthetic survey data for testing and benchmarking.

pub mod generate;

pub use generate::{generate_synthetic, GroundTruth, SyntheticConfig, SyntheticData};
