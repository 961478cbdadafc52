//! The exposure-wide screening engine.

use crate::correct::correct_screen;
use crate::data::{
    AssociationResult, CorrectedSet, DataDictionary, Dataset, FitFailure, ScreenResult,
    LOG_EPSILON,
};
use crate::design::SurveyDesign;
use crate::error::{Result, XwasError};
use crate::model::{association_formula, fit_association};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn default_fdr_level() -> f64 {
    0.05
}

fn default_epsilon() -> f64 {
    LOG_EPSILON
}

/// Configuration for a full XWAS run, YAML-serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Name of the screen, for reporting.
    pub name: String,
    /// Outcome column.
    pub outcome: String,
    /// Adjustment covariate columns, entered unstandardized.
    pub adjustments: Vec<String>,
    /// Dictionary categories to screen; empty means every category.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Exposure names excluded regardless of category.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Stratum column.
    pub stratum_column: String,
    /// Cluster (PSU) column.
    pub cluster_column: String,
    /// Sampling weight column.
    pub weight_column: String,
    /// FDR level for the corrected result set.
    #[serde(default = "default_fdr_level")]
    pub fdr_level: f64,
    /// Log-transform exposure columns before screening.
    #[serde(default)]
    pub log_transform: bool,
    /// Additive constant for the log transform.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl ScreenConfig {
    /// Load from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(XwasError::from)
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(XwasError::from)
    }
}

/// Screen every candidate exposure against the outcome.
///
/// Exposures are deduplicated and sorted by name, then each is fitted
/// independently against the same immutable design on a rayon pool; the
/// order-preserving collect plus the up-front sort keeps output
/// deterministic regardless of scheduling or input order. Intercept and
/// adjustment-covariate rows are stripped after fitting, leaving exactly
/// one row per successful exposure. A failed fit is recorded and the
/// screen continues.
pub fn run_screen(
    design: &SurveyDesign,
    exposures: &[String],
    outcome: &str,
    adjustments: &[String],
) -> Result<ScreenResult> {
    if exposures.is_empty() {
        return Err(XwasError::Screen(
            "Empty exposure list; nothing to screen".to_string(),
        ));
    }
    if adjustments.iter().any(|a| a == outcome) {
        return Err(XwasError::Screen(format!(
            "Outcome '{}' cannot also be an adjustment covariate",
            outcome
        )));
    }
    // a missing outcome or covariate would fail every fit; abort instead
    if !design.data().has_column(outcome) {
        return Err(XwasError::MissingColumn(outcome.to_string()));
    }
    for covariate in adjustments {
        if !design.data().has_column(covariate) {
            return Err(XwasError::MissingColumn(covariate.clone()));
        }
    }

    let mut sorted: Vec<String> = exposures.to_vec();
    sorted.sort();
    sorted.dedup();

    let fits: Vec<(String, Result<Vec<AssociationResult>>)> = sorted
        .par_iter()
        .map(|exposure| {
            let spec = association_formula(outcome, exposure, adjustments);
            log::debug!("Fitting {}", spec);
            (exposure.clone(), fit_association(design, exposure, &spec))
        })
        .collect();

    let mut associations = Vec::with_capacity(sorted.len());
    let mut failures = Vec::new();
    for (exposure, fit) in fits {
        match fit {
            Ok(rows) => {
                // keep the exposure's own coefficient, drop intercept and
                // covariate rows
                associations.extend(rows.into_iter().filter(|r| r.source == exposure));
            }
            Err(e) => {
                log::warn!("Skipping exposure '{}': {}", exposure, e);
                failures.push(FitFailure {
                    exposure,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(ScreenResult {
        outcome: outcome.to_string(),
        associations,
        failures,
    })
}

/// Run a configured XWAS end to end.
///
/// Filters non-positive weights, optionally log-transforms the selected
/// exposure columns (on a copy), builds the survey design, screens every
/// selected exposure, and applies BY correction with dictionary
/// descriptions merged in.
pub fn run_xwas(
    data: &Dataset,
    dictionary: &DataDictionary,
    config: &ScreenConfig,
) -> Result<CorrectedSet> {
    let exposures = dictionary.select_exposures(&config.categories, &config.exclude);
    if exposures.is_empty() {
        return Err(XwasError::Screen(
            "No exposures selected from the dictionary".to_string(),
        ));
    }
    // only screen exposures the dataset actually carries
    let exposures: Vec<String> = exposures
        .into_iter()
        .filter(|e| data.has_column(e))
        .collect();
    if exposures.is_empty() {
        return Err(XwasError::Screen(
            "None of the selected exposures appear in the dataset".to_string(),
        ));
    }

    let filtered = data.filter_positive_weights(&config.weight_column)?;
    let analyzed = if config.log_transform {
        filtered.log_transformed(&exposures, config.epsilon)?
    } else {
        filtered
    };

    let design = SurveyDesign::new(
        analyzed,
        &config.stratum_column,
        &config.cluster_column,
        &config.weight_column,
    )?;

    log::info!(
        "Screening {} exposures against '{}' ({} rows, {} strata, {} PSUs)",
        exposures.len(),
        config.outcome,
        design.n_rows(),
        design.n_strata(),
        design.n_psus()
    );

    let screen = run_screen(&design, &exposures, &config.outcome, &config.adjustments)?;
    Ok(correct_screen(&screen, config.fdr_level, Some(dictionary)))
}
