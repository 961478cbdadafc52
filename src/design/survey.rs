//! Survey design: strata, clusters, and sampling weights.

use crate::data::Dataset;
use crate::error::{Result, XwasError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How to handle a stratum containing a single sampled PSU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingletonMethod {
    /// Treat the stratum as sampled with certainty: it contributes no
    /// between-PSU variance.
    #[default]
    Certainty,
    /// Refuse to compute a variance when a singleton stratum appears.
    Fail,
}

/// Stratum and PSU keys derived from f64 codes. Zero is normalized so
/// that -0.0 and 0.0 land in the same group.
fn code_key(v: f64) -> u64 {
    if v == 0.0 {
        0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// A complex survey design bound to an analysis dataset.
///
/// Identifies each row's stratum, primary sampling unit, and sampling
/// weight. PSUs are keyed by the (stratum, cluster) pair, so cluster
/// codes may repeat across strata.
#[derive(Debug, Clone)]
pub struct SurveyDesign {
    data: Dataset,
    stratum_column: String,
    cluster_column: String,
    weight_column: String,
    singleton: SingletonMethod,
    /// Per-row stratum keys.
    strata: Vec<u64>,
    /// Per-row PSU keys, nested within stratum.
    psus: Vec<(u64, u64)>,
    /// Per-row sampling weights, validated strictly positive.
    weights: Vec<f64>,
}

impl SurveyDesign {
    /// Bind a dataset to its design columns.
    ///
    /// All three columns must exist, be numeric, and contain no missing
    /// values; weights must be strictly positive. Rows with zero or
    /// missing weights (out-of-subsample participants) must be removed
    /// first, see [`Dataset::filter_positive_weights`].
    pub fn new(
        data: Dataset,
        stratum_column: &str,
        cluster_column: &str,
        weight_column: &str,
    ) -> Result<Self> {
        if data.n_rows() == 0 {
            return Err(XwasError::EmptyData(
                "Survey design requires at least one row".to_string(),
            ));
        }

        let strata_values = data.numeric(stratum_column)?.to_vec();
        let cluster_values = data.numeric(cluster_column)?.to_vec();
        let weights = data.numeric(weight_column)?.to_vec();

        for (i, &s) in strata_values.iter().enumerate() {
            if !s.is_finite() {
                return Err(XwasError::InvalidDesign(format!(
                    "Missing stratum code at row {}",
                    i
                )));
            }
        }
        for (i, &c) in cluster_values.iter().enumerate() {
            if !c.is_finite() {
                return Err(XwasError::InvalidDesign(format!(
                    "Missing cluster code at row {}",
                    i
                )));
            }
        }
        for (i, &w) in weights.iter().enumerate() {
            if !w.is_finite() || w <= 0.0 {
                return Err(XwasError::InvalidDesign(format!(
                    "Weight at row {} is not strictly positive (found {})",
                    i, w
                )));
            }
        }

        let strata: Vec<u64> = strata_values.iter().map(|&s| code_key(s)).collect();
        let psus: Vec<(u64, u64)> = strata_values
            .iter()
            .zip(cluster_values.iter())
            .map(|(&s, &c)| (code_key(s), code_key(c)))
            .collect();

        Ok(Self {
            data,
            stratum_column: stratum_column.to_string(),
            cluster_column: cluster_column.to_string(),
            weight_column: weight_column.to_string(),
            singleton: SingletonMethod::default(),
            strata,
            psus,
            weights,
        })
    }

    /// Set the singleton-stratum policy.
    pub fn with_singleton_method(mut self, method: SingletonMethod) -> Self {
        self.singleton = method;
        self
    }

    /// The bound dataset.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Stratum column name.
    pub fn stratum_column(&self) -> &str {
        &self.stratum_column
    }

    /// Cluster column name.
    pub fn cluster_column(&self) -> &str {
        &self.cluster_column
    }

    /// Weight column name.
    pub fn weight_column(&self) -> &str {
        &self.weight_column
    }

    /// Singleton-stratum policy.
    pub fn singleton_method(&self) -> SingletonMethod {
        self.singleton
    }

    /// Number of rows in the bound dataset.
    pub fn n_rows(&self) -> usize {
        self.data.n_rows()
    }

    /// Per-row sampling weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of distinct strata over the whole dataset.
    pub fn n_strata(&self) -> usize {
        let mut keys: Vec<u64> = self.strata.clone();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    /// Number of distinct PSUs over the whole dataset.
    pub fn n_psus(&self) -> usize {
        let mut keys: Vec<(u64, u64)> = self.psus.clone();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    /// Group a subset of rows by stratum, then by PSU within stratum.
    ///
    /// The innermost vectors hold positions into `rows` (not dataset row
    /// indices), so callers can index score matrices built over the same
    /// subset. BTreeMap keys give a deterministic iteration order.
    pub(crate) fn grouped_psus(
        &self,
        rows: &[usize],
    ) -> BTreeMap<u64, BTreeMap<u64, Vec<usize>>> {
        let mut grouped: BTreeMap<u64, BTreeMap<u64, Vec<usize>>> = BTreeMap::new();
        for (pos, &row) in rows.iter().enumerate() {
            let (stratum, cluster) = self.psus[row];
            grouped
                .entry(stratum)
                .or_default()
                .entry(cluster)
                .or_default()
                .push(pos);
        }
        grouped
    }

    /// Design degrees of freedom over a subset of rows: number of PSUs
    /// minus number of strata, both counted on the subset.
    pub fn degrees_of_freedom(&self, rows: &[usize]) -> f64 {
        let grouped = self.grouped_psus(rows);
        let n_strata = grouped.len();
        let n_psus: usize = grouped.values().map(|psus| psus.len()).sum();
        n_psus as f64 - n_strata as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn design_dataset() -> Dataset {
        Dataset::new(
            (1..=8).map(|i| format!("P{}", i)).collect(),
            vec![
                (
                    "stratum".to_string(),
                    Column::Numeric(vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]),
                ),
                (
                    "psu".to_string(),
                    Column::Numeric(vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0]),
                ),
                (
                    "weight".to_string(),
                    Column::Numeric(vec![1.0, 2.0, 1.5, 1.0, 2.0, 1.0, 1.0, 1.5]),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_design() {
        let design = SurveyDesign::new(design_dataset(), "stratum", "psu", "weight").unwrap();
        assert_eq!(design.n_rows(), 8);
        assert_eq!(design.n_strata(), 2);
        assert_eq!(design.n_psus(), 4);
    }

    #[test]
    fn test_psu_codes_nest_within_strata() {
        // cluster code 1 appears in both strata but counts as two PSUs
        let design = SurveyDesign::new(design_dataset(), "stratum", "psu", "weight").unwrap();
        assert_eq!(design.n_psus(), 4);
    }

    #[test]
    fn test_degrees_of_freedom() {
        let design = SurveyDesign::new(design_dataset(), "stratum", "psu", "weight").unwrap();
        let all: Vec<usize> = (0..8).collect();
        assert_eq!(design.degrees_of_freedom(&all), 2.0);

        // subset touching one PSU per stratum: 2 PSUs - 2 strata = 0
        assert_eq!(design.degrees_of_freedom(&[0, 4]), 0.0);
    }

    #[test]
    fn test_missing_design_column() {
        let result = SurveyDesign::new(design_dataset(), "stratum", "cluster_id", "weight");
        assert!(matches!(result, Err(XwasError::MissingColumn(_))));
    }

    #[test]
    fn test_nonpositive_weight_rejected() {
        let data = Dataset::new(
            vec!["P1".to_string(), "P2".to_string()],
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0, 1.0])),
                ("psu".to_string(), Column::Numeric(vec![1.0, 2.0])),
                ("weight".to_string(), Column::Numeric(vec![1.0, 0.0])),
            ],
        )
        .unwrap();
        let result = SurveyDesign::new(data, "stratum", "psu", "weight");
        assert!(matches!(result, Err(XwasError::InvalidDesign(_))));
    }

    #[test]
    fn test_missing_stratum_rejected() {
        let data = Dataset::new(
            vec!["P1".to_string(), "P2".to_string()],
            vec![
                ("stratum".to_string(), Column::Numeric(vec![1.0, f64::NAN])),
                ("psu".to_string(), Column::Numeric(vec![1.0, 2.0])),
                ("weight".to_string(), Column::Numeric(vec![1.0, 1.0])),
            ],
        )
        .unwrap();
        let result = SurveyDesign::new(data, "stratum", "psu", "weight");
        assert!(matches!(result, Err(XwasError::InvalidDesign(_))));
    }

    #[test]
    fn test_categorical_design_column_rejected() {
        let data = Dataset::new(
            vec!["P1".to_string()],
            vec![
                (
                    "stratum".to_string(),
                    Column::Categorical(vec![Some("north".to_string())]),
                ),
                ("psu".to_string(), Column::Numeric(vec![1.0])),
                ("weight".to_string(), Column::Numeric(vec![1.0])),
            ],
        )
        .unwrap();
        let result = SurveyDesign::new(data, "stratum", "psu", "weight");
        assert!(matches!(result, Err(XwasError::InvalidColumnType { .. })));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let data = Dataset::new(vec![], vec![]).unwrap();
        let result = SurveyDesign::new(data, "stratum", "psu", "weight");
        assert!(matches!(result, Err(XwasError::EmptyData(_))));
    }
}
