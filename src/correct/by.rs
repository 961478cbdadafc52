//! Benjamini-Yekutieli false discovery rate correction.

use crate::data::{CorrectedResult, CorrectedSet, DataDictionary, ScreenResult};
use serde::{Deserialize, Serialize};

/// Result of BY correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByCorrected {
    /// Exposure names in original input order.
    pub exposures: Vec<String>,
    /// Raw p-values in input order.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values) in input order; NaN where the input
    /// p-value was not finite.
    pub q_values: Vec<f64>,
    /// Number of tests entering the correction (finite p-values only).
    pub n_tests: usize,
}

impl ByCorrected {
    /// Get the q-value for a specific exposure.
    pub fn get_qvalue(&self, exposure: &str) -> Option<f64> {
        let idx = self.exposures.iter().position(|e| e == exposure)?;
        self.q_values.get(idx).copied()
    }

    /// Count significant results at a level. NaN q-values never count.
    pub fn n_significant(&self, level: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < level).count()
    }

    /// Largest raw p-value among tests with q-value below the level, the
    /// per-test cutoff implied by the correction. None when nothing is
    /// significant.
    pub fn significance_threshold(&self, level: f64) -> Option<f64> {
        self.p_values
            .iter()
            .zip(&self.q_values)
            .filter(|(_, &q)| q < level)
            .map(|(&p, _)| p)
            .max_by(|a, b| a.total_cmp(b))
    }
}

/// Apply Benjamini-Yekutieli FDR correction.
///
/// BY controls the FDR under arbitrary dependency among tests. With M
/// p-values sorted ascending (ties broken by input index), the harmonic
/// constant c(M) = sum_{i=1..M} 1/i inflates the Benjamini-Hochberg
/// scaling:
///
///   q_(k) = min_{j >= k} ( p_(j) * M * c(M) / j ), clipped to 1.0
///
/// Non-finite p-values are excluded from M and adjust to NaN; empty or
/// all-NaN input yields an empty correction with a logged diagnostic.
pub fn correct_by(p_values: &[f64], exposures: &[String]) -> ByCorrected {
    // only finite p-values are ranked
    let finite: Vec<usize> = (0..p_values.len())
        .filter(|&i| p_values[i].is_finite())
        .collect();
    let m = finite.len();

    if m == 0 {
        if !p_values.is_empty() {
            log::warn!(
                "BY correction received {} p-values, none finite; returning an empty correction",
                p_values.len()
            );
        }
        return ByCorrected {
            exposures: exposures.to_vec(),
            p_values: p_values.to_vec(),
            q_values: vec![f64::NAN; p_values.len()],
            n_tests: 0,
        };
    }

    let mut order = finite.clone();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]).then(a.cmp(&b)));

    let c_m: f64 = (1..=m).map(|i| 1.0 / i as f64).sum();
    let m_f64 = m as f64;

    // backward pass enforces monotone non-decreasing q along sorted p
    let mut q_sorted = vec![0.0; m];
    q_sorted[m - 1] = (p_values[order[m - 1]] * c_m).min(1.0);
    for k in (0..m - 1).rev() {
        let rank = k + 1;
        let adjusted = p_values[order[k]] * m_f64 * c_m / rank as f64;
        q_sorted[k] = adjusted.min(q_sorted[k + 1]).min(1.0);
    }

    let mut q_values = vec![f64::NAN; p_values.len()];
    for (k, &orig_idx) in order.iter().enumerate() {
        q_values[orig_idx] = q_sorted[k];
    }

    ByCorrected {
        exposures: exposures.to_vec(),
        p_values: p_values.to_vec(),
        q_values,
        n_tests: m,
    }
}

/// Correct a finished screen and assemble the final result set.
///
/// Attaches BY q-values to every association, merges dictionary
/// descriptions when a dictionary is supplied, and carries the failure
/// list forward so exposures without a usable result stay distinguishable
/// from analyzed-but-non-significant ones.
pub fn correct_screen(
    screen: &ScreenResult,
    fdr_level: f64,
    dictionary: Option<&DataDictionary>,
) -> CorrectedSet {
    let p_values: Vec<f64> = screen.associations.iter().map(|r| r.p_value).collect();
    let exposures: Vec<String> = screen.associations.iter().map(|r| r.exposure.clone()).collect();
    let by = correct_by(&p_values, &exposures);

    let results: Vec<CorrectedResult> = screen
        .associations
        .iter()
        .enumerate()
        .map(|(i, r)| CorrectedResult {
            exposure: r.exposure.clone(),
            term: r.term.clone(),
            estimate: r.estimate,
            std_error: r.std_error,
            statistic: r.statistic,
            p_value: r.p_value,
            q_value: by.q_values.get(i).copied().unwrap_or(f64::NAN),
            df: r.df,
            n_obs: r.n_obs,
            description: dictionary
                .and_then(|d| d.description(&r.exposure))
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    CorrectedSet {
        outcome: screen.outcome.clone(),
        fdr_level,
        results,
        failures: screen.failures.clone(),
    }
}
