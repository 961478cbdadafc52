//! Result types for exposure-wide screening.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Association between one exposure and the outcome, from a
/// survey-weighted fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationResult {
    /// Exposure variable being screened.
    pub exposure: String,
    /// Coefficient label, e.g. "std(cadmium)" or "sexmale".
    pub term: String,
    /// Dataset column the coefficient derives from.
    pub source: String,
    /// Estimated effect per standard deviation of exposure.
    pub estimate: f64,
    /// Design-based (linearized) standard error.
    pub std_error: f64,
    /// t statistic.
    pub statistic: f64,
    /// Two-sided p-value on the design degrees of freedom.
    pub p_value: f64,
    /// Design degrees of freedom (PSUs minus strata).
    pub df: f64,
    /// Number of complete-case observations in the fit.
    pub n_obs: usize,
}

/// A fit that could not be completed; the screen records it and moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFailure {
    /// Exposure whose fit failed.
    pub exposure: String,
    /// Why the fit failed.
    pub reason: String,
}

/// Raw output of a screen: one association per successfully fitted
/// exposure, plus the failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Outcome variable screened against.
    pub outcome: String,
    /// Per-exposure associations, in exposure sort order.
    pub associations: Vec<AssociationResult>,
    /// Exposures whose fits failed.
    pub failures: Vec<FitFailure>,
}

impl ScreenResult {
    /// Number of exposures with a completed fit.
    pub fn len(&self) -> usize {
        self.associations.len()
    }

    /// True if no fit completed.
    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// Number of exposures attempted (completed plus failed).
    pub fn n_attempted(&self) -> usize {
        self.associations.len() + self.failures.len()
    }

    /// Associations sorted by raw p-value (ascending).
    pub fn sorted_by_pvalue(&self) -> Vec<&AssociationResult> {
        let mut sorted: Vec<_> = self.associations.iter().collect();
        sorted.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
        sorted
    }
}

/// One association after multiplicity correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectedResult {
    /// Exposure variable.
    pub exposure: String,
    /// Coefficient label.
    pub term: String,
    /// Estimated effect per standard deviation of exposure.
    pub estimate: f64,
    /// Design-based standard error.
    pub std_error: f64,
    /// t statistic.
    pub statistic: f64,
    /// Raw two-sided p-value.
    pub p_value: f64,
    /// Benjamini-Yekutieli adjusted p-value.
    pub q_value: f64,
    /// Design degrees of freedom.
    pub df: f64,
    /// Number of complete-case observations.
    pub n_obs: usize,
    /// Description from the data dictionary, if catalogued.
    pub description: String,
}

/// Final output of a screen: corrected associations plus the failures
/// carried through from fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectedSet {
    /// Outcome variable screened against.
    pub outcome: String,
    /// FDR level the screen was configured with.
    pub fdr_level: f64,
    /// Corrected per-exposure associations, in exposure sort order.
    pub results: Vec<CorrectedResult>,
    /// Exposures whose fits failed.
    pub failures: Vec<FitFailure>,
}

impl CorrectedSet {
    /// Number of corrected associations.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if no association survived fitting.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted by q-value (ascending).
    pub fn sorted_by_qvalue(&self) -> Vec<&CorrectedResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.q_value.total_cmp(&b.q_value));
        sorted
    }

    /// Results sorted by raw p-value (ascending).
    pub fn sorted_by_pvalue(&self) -> Vec<&CorrectedResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
        sorted
    }

    /// Results significant at the configured FDR level.
    pub fn significant(&self) -> Vec<&CorrectedResult> {
        self.significant_at(self.fdr_level)
    }

    /// Results with q-value below a custom level.
    pub fn significant_at(&self, level: f64) -> Vec<&CorrectedResult> {
        self.results.iter().filter(|r| r.q_value < level).collect()
    }

    /// Largest raw p-value among results whose q-value is below the given
    /// level: the effective per-test significance cutoff implied by the
    /// correction. None when nothing is significant.
    pub fn significance_threshold(&self, level: f64) -> Option<f64> {
        self.results
            .iter()
            .filter(|r| r.q_value < level)
            .map(|r| r.p_value)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Counts of significant results at standard levels.
    pub fn summary(&self) -> ScreenSummary {
        ScreenSummary {
            tested: self.len(),
            failed: self.failures.len(),
            significant_001: self.results.iter().filter(|r| r.q_value < 0.001).count(),
            significant_01: self.results.iter().filter(|r| r.q_value < 0.01).count(),
            significant_05: self.results.iter().filter(|r| r.q_value < 0.05).count(),
            significant_10: self.results.iter().filter(|r| r.q_value < 0.10).count(),
        }
    }

    /// Write corrected results to a TSV file, one row per exposure.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "exposure\tterm\testimate\tstd_error\tstatistic\tp_value\tq_value\tdf\tn_obs\tdescription"
        )?;

        for r in &self.results {
            writeln!(
                writer,
                "{}\t{}\t{:.6}\t{:.6}\t{:.4}\t{:.3e}\t{:.3e}\t{:.0}\t{}\t{}",
                r.exposure,
                r.term,
                r.estimate,
                r.std_error,
                r.statistic,
                r.p_value,
                r.q_value,
                r.df,
                r.n_obs,
                r.description
            )?;
        }

        Ok(())
    }

    /// Iterate over corrected results.
    pub fn iter(&self) -> impl Iterator<Item = &CorrectedResult> {
        self.results.iter()
    }
}

/// Summary counts for a corrected screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenSummary {
    pub tested: usize,
    pub failed: usize,
    pub significant_001: usize,
    pub significant_01: usize,
    pub significant_05: usize,
    pub significant_10: usize,
}

impl std::fmt::Display for ScreenSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Exposures tested:  {}", self.tested)?;
        writeln!(f, "Exposures failed:  {}", self.failed)?;
        writeln!(f, "Significant at q < 0.001: {}", self.significant_001)?;
        writeln!(f, "Significant at q < 0.01:  {}", self.significant_01)?;
        writeln!(f, "Significant at q < 0.05:  {}", self.significant_05)?;
        writeln!(f, "Significant at q < 0.10:  {}", self.significant_10)?;
        Ok(())
    }
}
