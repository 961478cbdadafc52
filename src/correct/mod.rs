//! Multiple testing correction.

pub mod by;

pub use by::{correct_by, correct_screen, ByCorrected};
