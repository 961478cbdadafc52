//! Screening engine: one regression per candidate exposure.

pub mod runner;

pub use runner::{run_screen, run_xwas, ScreenConfig};
