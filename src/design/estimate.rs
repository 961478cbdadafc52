//! Design-based point estimates with Taylor-linearized standard errors.

use crate::design::{SingletonMethod, SurveyDesign};
use crate::error::{Result, XwasError};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A design-based estimate with its linearized standard error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyEstimate {
    /// Point estimate.
    pub estimate: f64,
    /// Taylor-linearized standard error.
    pub std_error: f64,
    /// Design degrees of freedom over the analyzed rows (PSUs minus strata).
    pub df: f64,
    /// Number of non-missing observations used.
    pub n_obs: usize,
}

/// Between-PSU covariance of cluster totals of per-row linearization
/// scores.
///
/// `scores` has one row per entry of `rows` and one column per statistic.
/// Within each stratum of n_h PSUs, cluster totals are centered on their
/// stratum mean and the squared deviations accumulated with an
/// n_h/(n_h - 1) factor. Singleton strata follow the design's
/// [`SingletonMethod`].
pub fn taylor_variance(
    design: &SurveyDesign,
    rows: &[usize],
    scores: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    if scores.nrows() != rows.len() {
        return Err(XwasError::DimensionMismatch {
            expected: rows.len(),
            actual: scores.nrows(),
        });
    }

    let k = scores.ncols();
    let mut total: DMatrix<f64> = DMatrix::zeros(k, k);

    for (stratum_key, psus) in design.grouped_psus(rows) {
        let n_h = psus.len();
        if n_h < 2 {
            match design.singleton_method() {
                SingletonMethod::Certainty => continue,
                SingletonMethod::Fail => {
                    return Err(XwasError::InvalidDesign(format!(
                        "Stratum {} has a single PSU",
                        f64::from_bits(stratum_key)
                    )));
                }
            }
        }

        // cluster totals of scores
        let totals: Vec<DVector<f64>> = psus
            .values()
            .map(|positions| {
                let mut t = DVector::zeros(k);
                for &pos in positions {
                    t += scores.row(pos).transpose();
                }
                t
            })
            .collect();

        let mut mean = DVector::zeros(k);
        for t in &totals {
            mean += t;
        }
        mean /= n_h as f64;

        let factor = n_h as f64 / (n_h as f64 - 1.0);
        for t in &totals {
            let centered = t - &mean;
            total += factor * (&centered * centered.transpose());
        }
    }

    Ok(total)
}

/// Survey-weighted mean of a numeric column with its linearized standard
/// error. Missing values are excluded; the weighted mean is the ratio
/// estimator sum(w*y)/sum(w).
pub fn weighted_mean(design: &SurveyDesign, column: &str) -> Result<SurveyEstimate> {
    let y = design.data().numeric(column)?;
    let weights = design.weights();

    let rows: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    if rows.is_empty() {
        return Err(XwasError::EmptyData(format!(
            "No observed values in '{}'",
            column
        )));
    }

    let w_total: f64 = rows.iter().map(|&i| weights[i]).sum();
    let estimate = rows.iter().map(|&i| weights[i] * y[i]).sum::<f64>() / w_total;

    // ratio-estimator scores: u_i = w_i (y_i - mean) / W
    let scores = DMatrix::from_iterator(
        rows.len(),
        1,
        rows.iter().map(|&i| weights[i] * (y[i] - estimate) / w_total),
    );
    let variance = taylor_variance(design, &rows, &scores)?;

    Ok(SurveyEstimate {
        estimate,
        std_error: variance[(0, 0)].max(0.0).sqrt(),
        df: design.degrees_of_freedom(&rows),
        n_obs: rows.len(),
    })
}

/// Survey-weighted variance of a numeric column with its linearized
/// standard error. Uses the sum(w*(y-mean)^2)/(sum(w)-1) estimator.
pub fn weighted_variance(design: &SurveyDesign, column: &str) -> Result<SurveyEstimate> {
    let y = design.data().numeric(column)?;
    let weights = design.weights();

    let rows: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    if rows.len() < 2 {
        return Err(XwasError::EmptyData(format!(
            "Variance of '{}' needs at least two observed values",
            column
        )));
    }

    let w_total: f64 = rows.iter().map(|&i| weights[i]).sum();
    if w_total <= 1.0 {
        return Err(XwasError::Numerical(format!(
            "Total weight {} too small for the variance denominator",
            w_total
        )));
    }

    let mean = rows.iter().map(|&i| weights[i] * y[i]).sum::<f64>() / w_total;
    let estimate = rows
        .iter()
        .map(|&i| weights[i] * (y[i] - mean).powi(2))
        .sum::<f64>()
        / (w_total - 1.0);

    // scores: u_i = w_i ((y_i - mean)^2 - estimate) / (W - 1)
    let scores = DMatrix::from_iterator(
        rows.len(),
        1,
        rows.iter()
            .map(|&i| weights[i] * ((y[i] - mean).powi(2) - estimate) / (w_total - 1.0)),
    );
    let variance = taylor_variance(design, &rows, &scores)?;

    Ok(SurveyEstimate {
        estimate,
        std_error: variance[(0, 0)].max(0.0).sqrt(),
        df: design.degrees_of_freedom(&rows),
        n_obs: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Dataset};
    use approx::assert_relative_eq;

    fn srs_design(y: Vec<f64>) -> SurveyDesign {
        // one stratum, every row its own PSU, unit weights
        let n = y.len();
        let data = Dataset::new(
            (1..=n).map(|i| format!("P{}", i)).collect(),
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0; n])),
                (
                    "psu".to_string(),
                    Column::Numeric((1..=n).map(|i| i as f64).collect()),
                ),
                ("weight".to_string(), Column::Numeric(vec![1.0; n])),
                ("y".to_string(), Column::Numeric(y)),
            ],
        )
        .unwrap();
        SurveyDesign::new(data, "stratum", "psu", "weight").unwrap()
    }

    #[test]
    fn test_weighted_mean_point_estimate() {
        let design = srs_design(vec![1.0, 2.0, 3.0, 4.0]);
        let est = weighted_mean(&design, "y").unwrap();
        assert_relative_eq!(est.estimate, 2.5);
        assert_eq!(est.n_obs, 4);
    }

    #[test]
    fn test_mean_matches_srs_formula() {
        // with unit weights and row-per-PSU the linearized SE is s/sqrt(n)
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let design = srs_design(y.clone());
        let est = weighted_mean(&design, "y").unwrap();

        let n = y.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let s2 = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert_relative_eq!(est.std_error, (s2 / n).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(est.df, n - 1.0);
    }

    #[test]
    fn test_weights_shift_the_mean() {
        let data = Dataset::new(
            vec!["P1".to_string(), "P2".to_string()],
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0, 1.0])),
                ("psu".to_string(), Column::Numeric(vec![1.0, 2.0])),
                ("weight".to_string(), Column::Numeric(vec![2.0, 1.0])),
                ("y".to_string(), Column::Numeric(vec![1.0, 2.0])),
            ],
        )
        .unwrap();
        let design = SurveyDesign::new(data, "stratum", "psu", "weight").unwrap();
        let est = weighted_mean(&design, "y").unwrap();
        assert_relative_eq!(est.estimate, 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clustered_se_hand_computed() {
        // one stratum, two PSUs of two rows each, unit weights
        let data = Dataset::new(
            (1..=4).map(|i| format!("P{}", i)).collect(),
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0; 4])),
                ("psu".to_string(), Column::Numeric(vec![1.0, 1.0, 2.0, 2.0])),
                ("weight".to_string(), Column::Numeric(vec![1.0; 4])),
                ("y".to_string(), Column::Numeric(vec![1.0, 2.0, 3.0, 4.0])),
            ],
        )
        .unwrap();
        let design = SurveyDesign::new(data, "stratum", "psu", "weight").unwrap();
        let est = weighted_mean(&design, "y").unwrap();

        // scores are (y - 2.5)/4; PSU totals -0.5 and 0.5; centered on 0;
        // variance = 2/(2-1) * (0.25 + 0.25) = 1.0
        assert_relative_eq!(est.std_error, 1.0, epsilon = 1e-12);
        assert_relative_eq!(est.df, 1.0);
    }

    #[test]
    fn test_weighted_variance_srs() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let design = srs_design(y.clone());
        let est = weighted_variance(&design, "y").unwrap();

        let n = y.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let s2 = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert_relative_eq!(est.estimate, s2, epsilon = 1e-12);
        assert!(est.std_error > 0.0);
    }

    #[test]
    fn test_missing_values_excluded() {
        let design = srs_design(vec![1.0, f64::NAN, 3.0, 4.0]);
        let est = weighted_mean(&design, "y").unwrap();
        assert_eq!(est.n_obs, 3);
        assert_relative_eq!(est.estimate, 8.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singleton_stratum_certainty() {
        let data = Dataset::new(
            (1..=3).map(|i| format!("P{}", i)).collect(),
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0, 1.0, 2.0])),
                ("psu".to_string(), Column::Numeric(vec![1.0, 2.0, 1.0])),
                ("weight".to_string(), Column::Numeric(vec![1.0; 3])),
                ("y".to_string(), Column::Numeric(vec![1.0, 2.0, 3.0])),
            ],
        )
        .unwrap();
        let design = SurveyDesign::new(data, "stratum", "psu", "weight").unwrap();

        // default Certainty: the singleton stratum contributes no variance
        let est = weighted_mean(&design, "y").unwrap();
        assert!(est.std_error.is_finite());

        // Fail: the same estimate errors out
        let strict = design.with_singleton_method(SingletonMethod::Fail);
        assert!(matches!(
            weighted_mean(&strict, "y"),
            Err(XwasError::InvalidDesign(_))
        ));
    }

    #[test]
    fn test_all_missing_errors() {
        let design = srs_design(vec![f64::NAN, f64::NAN]);
        assert!(matches!(
            weighted_mean(&design, "y"),
            Err(XwasError::EmptyData(_))
        ));
    }
}
