//! Survey-weighted exposure-wide association screening (XWAS)
//!
//! This library screens a panel of candidate exposure variables for
//! association with a single outcome in complex-survey data, one
//! survey-weighted regression per exposure, with Benjamini-Yekutieli
//! FDR correction across the results.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (Dataset, DataDictionary, FormulaSpec, results)
//! - **design**: Survey designs and design-based estimation (weighted mean/variance, WLS)
//! - **model**: The per-exposure association model
//! - **screen**: The screening engine and configured pipeline
//! - **correct**: Benjamini-Yekutieli multiple testing correction
//! - **synth**: Synthetic survey data with known ground truth
//!
//! # Example
//!
//! ```no_run
//! use survey_xwas::prelude::*;
//!
//! // Load data
//! let data = Dataset::from_tsv("participants.tsv").unwrap();
//! let dictionary = DataDictionary::from_tsv("dictionary.tsv").unwrap();
//!
//! // Screen every heavy-metal biomarker against telomere length
//! let filtered = data.filter_positive_weights("weight").unwrap();
//! let design = SurveyDesign::new(filtered, "stratum", "psu", "weight").unwrap();
//! let exposures = dictionary.select_exposures(&["heavy_metals".to_string()], &[]);
//!
//! let screen = run_screen(
//!     &design,
//!     &exposures,
//!     "telomere",
//!     &["age".to_string(), "sex".to_string()],
//! )
//! .unwrap();
//! let results = correct_screen(&screen, 0.05, Some(&dictionary));
//! println!("{}", results.summary());
//! ```

pub mod correct;
pub mod data;
pub mod design;
pub mod error;
pub mod model;
pub mod screen;
pub mod synth;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::correct::{correct_by, correct_screen, ByCorrected};
    pub use crate::data::{
        AssociationResult, Column, CorrectedResult, CorrectedSet, DataDictionary, Dataset,
        ExposureVariable, FitFailure, FormulaSpec, ScreenResult, ScreenSummary, TermSpec,
        Transform, LOG_EPSILON,
    };
    pub use crate::design::{
        fit_wls, weighted_mean, weighted_variance, Coefficient, FittedModel, SingletonMethod,
        SurveyDesign, SurveyEstimate,
    };
    pub use crate::error::{Result, XwasError};
    pub use crate::model::{association_formula, fit_association};
    pub use crate::screen::{run_screen, run_xwas, ScreenConfig};
    pub use crate::synth::{generate_synthetic, GroundTruth, SyntheticConfig, SyntheticData};
}
