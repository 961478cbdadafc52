//! Data structures for exposure-wide screening.

mod dataset;
mod dictionary;
mod formula;
mod result;

pub use dataset::{Column, Dataset};
pub use dictionary::{DataDictionary, ExposureVariable};
pub use formula::{FormulaSpec, TermSpec, Transform, LOG_EPSILON};
pub use result::{
    AssociationResult, CorrectedResult, CorrectedSet, FitFailure, ScreenResult, ScreenSummary,
};
