//! Per-exposure association models.

pub mod association;

pub use association::{association_formula, fit_association};
