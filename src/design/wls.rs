//! Survey-weighted least squares with linearized standard errors.

use crate::data::{Column, Dataset, FormulaSpec, TermSpec, Transform, LOG_EPSILON};
use crate::design::estimate::taylor_variance;
use crate::design::SurveyDesign;
use crate::error::{Result, XwasError};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::HashSet;

/// One fitted coefficient with its design-based inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficient {
    /// Coefficient label, e.g. "(Intercept)", "std(cadmium)", "sexmale".
    pub term: String,
    /// Dataset column the coefficient derives from ("(Intercept)" for the
    /// intercept). Dummy-coded levels share their column's source.
    pub source: String,
    /// Point estimate.
    pub estimate: f64,
    /// Taylor-linearized standard error.
    pub std_error: f64,
    /// t statistic.
    pub statistic: f64,
    /// Two-sided p-value on the design degrees of freedom.
    pub p_value: f64,
}

/// A fitted survey-weighted linear model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    /// Model description, e.g. "std(sbp) ~ std(cadmium) + age + sexmale".
    pub formula: String,
    /// Coefficients in design-matrix column order.
    pub coefficients: Vec<Coefficient>,
    /// Design degrees of freedom over the analyzed rows.
    pub df: f64,
    /// Number of complete-case rows in the fit.
    pub n_obs: usize,
}

impl FittedModel {
    /// Look up a coefficient by its label.
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }

    /// All coefficients derived from a dataset column.
    pub fn coefficients_from(&self, source: &str) -> Vec<&Coefficient> {
        self.coefficients
            .iter()
            .filter(|c| c.source == source)
            .collect()
    }

    /// Coefficient labels in order.
    pub fn coefficient_names(&self) -> Vec<&str> {
        self.coefficients.iter().map(|c| c.term.as_str()).collect()
    }
}

/// Row indices where every model variable is observed.
fn complete_case_rows(data: &Dataset, variables: &[&str]) -> Result<Vec<usize>> {
    let mut keep = vec![true; data.n_rows()];
    for var in variables {
        match data.column(var)? {
            Column::Numeric(values) => {
                for (i, v) in values.iter().enumerate() {
                    if v.is_nan() {
                        keep[i] = false;
                    }
                }
            }
            Column::Categorical(values) => {
                for (i, v) in values.iter().enumerate() {
                    if v.is_none() {
                        keep[i] = false;
                    }
                }
            }
        }
    }
    Ok(keep
        .iter()
        .enumerate()
        .filter(|(_, k)| **k)
        .map(|(i, _)| i)
        .collect())
}

/// Center to mean zero and unit standard deviation (unweighted, n-1
/// denominator) over the analyzed rows.
fn standardize(values: &[f64], column: &str) -> Result<Vec<f64>> {
    let zero_variance = || XwasError::SingularFit {
        variable: column.to_string(),
        reason: "zero variance in the analyzed sample".to_string(),
    };

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return Err(zero_variance());
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    if !(sd > 0.0) {
        return Err(zero_variance());
    }
    Ok(values.iter().map(|v| (v - mean) / sd).collect())
}

/// Pull a numeric column over the analyzed rows and apply its transform.
fn transformed_values(data: &Dataset, term: &TermSpec, rows: &[usize]) -> Result<Vec<f64>> {
    let values = data.numeric(&term.column)?;
    let subset: Vec<f64> = rows.iter().map(|&i| values[i]).collect();
    match term.transform {
        Transform::Identity => Ok(subset),
        Transform::Log => {
            if subset.iter().any(|&x| x + LOG_EPSILON <= 0.0) {
                return Err(XwasError::Numerical(format!(
                    "Log transform of non-positive value in '{}'",
                    term.column
                )));
            }
            Ok(subset.iter().map(|&x| (x + LOG_EPSILON).ln()).collect())
        }
        Transform::Standardize => standardize(&subset, &term.column),
    }
}

/// Two-sided p-value from a t statistic on the given degrees of freedom.
fn two_sided_p(statistic: f64, df: f64) -> f64 {
    if !statistic.is_finite() || df <= 0.0 {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(statistic.abs())),
        Err(_) => f64::NAN,
    }
}

/// Fit a survey-weighted linear model.
///
/// Rows with any missing model variable are dropped. Point estimates
/// solve the weighted normal equations; standard errors come from the
/// linearized between-PSU covariance of the per-row score vectors
/// (X'WX)^-1 x_i w_i e_i, with degrees of freedom PSUs minus strata on
/// the analyzed rows.
pub fn fit_wls(design: &SurveyDesign, spec: &FormulaSpec) -> Result<FittedModel> {
    let data = design.data();
    let variables = spec.variables();
    for var in &variables {
        if !data.has_column(var) {
            return Err(XwasError::MissingColumn(var.to_string()));
        }
    }

    let rows = complete_case_rows(data, &variables)?;
    if rows.is_empty() {
        return Err(XwasError::EmptyData(
            "No complete cases for the model".to_string(),
        ));
    }

    let outcome = transformed_values(data, &spec.outcome, &rows)?;

    // assemble columns: intercept first, then terms in order
    let mut names: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    if spec.intercept {
        names.push("(Intercept)".to_string());
        sources.push("(Intercept)".to_string());
        columns.push(vec![1.0; rows.len()]);
    }

    for term in &spec.terms {
        match (data.column(&term.column)?, term.transform) {
            (Column::Numeric(_), _) => {
                columns.push(transformed_values(data, term, &rows)?);
                names.push(term.to_string());
                sources.push(term.column.clone());
            }
            (Column::Categorical(values), Transform::Identity) => {
                // levels over the analyzed rows; reference is the
                // alphabetically first and is dropped when an intercept
                // is present
                let mut levels: Vec<String> = rows
                    .iter()
                    .filter_map(|&i| values[i].clone())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                levels.sort();

                if spec.intercept && levels.len() < 2 {
                    return Err(XwasError::SingularFit {
                        variable: term.column.clone(),
                        reason: "only one level in the analyzed sample".to_string(),
                    });
                }

                for level in &levels {
                    if spec.intercept && level == &levels[0] {
                        continue;
                    }
                    names.push(format!("{}{}", term.column, level));
                    sources.push(term.column.clone());
                    columns.push(
                        rows.iter()
                            .map(|&i| {
                                if values[i].as_deref() == Some(level.as_str()) {
                                    1.0
                                } else {
                                    0.0
                                }
                            })
                            .collect(),
                    );
                }
            }
            (Column::Categorical(_), _) => {
                return Err(XwasError::InvalidColumnType {
                    column: term.column.clone(),
                    reason: "cannot transform a categorical column".to_string(),
                });
            }
        }
    }

    let n = rows.len();
    let k = columns.len();
    if n <= k {
        return Err(XwasError::Numerical(
            "Model is saturated (n_obs <= n_coefficients)".to_string(),
        ));
    }

    let mut x = DMatrix::zeros(n, k);
    for (j, col) in columns.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            x[(i, j)] = v;
        }
    }
    let y = DVector::from_vec(outcome);
    let w: Vec<f64> = rows.iter().map(|&i| design.weights()[i]).collect();

    // weighted normal equations: beta = (X'WX)^-1 X'Wy
    let mut xw = x.clone();
    for (i, &wi) in w.iter().enumerate() {
        for j in 0..k {
            xw[(i, j)] *= wi;
        }
    }
    let xtwx = x.transpose() * &xw;
    let xtwx_inv = xtwx.try_inverse().ok_or_else(|| {
        XwasError::Numerical("Design matrix is singular (X'WX not invertible)".to_string())
    })?;
    let xtwy = xw.transpose() * &y;
    let beta = &xtwx_inv * xtwy;

    let residuals = &y - &x * &beta;

    // per-row scores: delta_i' = w_i e_i x_i' (X'WX)^-1
    let mut scaled = x.clone();
    for i in 0..n {
        let s = w[i] * residuals[i];
        for j in 0..k {
            scaled[(i, j)] *= s;
        }
    }
    let scores = scaled * &xtwx_inv;
    let vcov = taylor_variance(design, &rows, &scores)?;
    let df = design.degrees_of_freedom(&rows);

    let coefficients: Vec<Coefficient> = names
        .into_iter()
        .zip(sources)
        .enumerate()
        .map(|(j, (term, source))| {
            let estimate = beta[j];
            let std_error = vcov[(j, j)].max(0.0).sqrt();
            let statistic = if std_error > 0.0 {
                estimate / std_error
            } else {
                f64::NAN
            };
            let p_value = two_sided_p(statistic, df);
            Coefficient {
                term,
                source,
                estimate,
                std_error,
                statistic,
                p_value,
            }
        })
        .collect();

    Ok(FittedModel {
        formula: spec.to_string(),
        coefficients,
        df,
        n_obs: n,
    })
}
