//! Model specification for survey-weighted regression.

use serde::{Deserialize, Serialize};

/// Additive constant applied before log transformation, so that zero
/// readings stay finite.
pub const LOG_EPSILON: f64 = 1e-10;

/// Transformation applied to a variable while building the design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Use values as-is.
    #[default]
    Identity,
    /// ln(x + epsilon).
    Log,
    /// Center to mean zero and scale to unit standard deviation.
    Standardize,
}

/// One model term: a column paired with its transformation.
///
/// Categorical columns take `Identity` only; they are expanded to
/// indicator variables during design matrix assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    /// Dataset column name.
    pub column: String,
    /// Transformation applied to the column.
    #[serde(default)]
    pub transform: Transform,
}

impl TermSpec {
    /// An untransformed term.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            transform: Transform::Identity,
        }
    }

    /// A log-transformed term.
    pub fn logged(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            transform: Transform::Log,
        }
    }

    /// A standardized term.
    pub fn standardized(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            transform: Transform::Standardize,
        }
    }
}

impl std::fmt::Display for TermSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.transform {
            Transform::Identity => write!(f, "{}", self.column),
            Transform::Log => write!(f, "log({})", self.column),
            Transform::Standardize => write!(f, "std({})", self.column),
        }
    }
}

/// A regression model specification: one outcome, ordered predictor
/// terms, and an optional intercept.
///
/// Built by construction rather than parsed from a string, so the set of
/// expressible models is exactly the set of supported ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSpec {
    /// Outcome term.
    pub outcome: TermSpec,
    /// Predictor terms in design-matrix column order.
    pub terms: Vec<TermSpec>,
    /// Whether to include an intercept column.
    pub intercept: bool,
}

impl FormulaSpec {
    /// Create a specification with an intercept and no predictors.
    pub fn new(outcome: TermSpec) -> Self {
        Self {
            outcome,
            terms: Vec::new(),
            intercept: true,
        }
    }

    /// Append a predictor term.
    pub fn with_term(mut self, term: TermSpec) -> Self {
        self.terms.push(term);
        self
    }

    /// Drop the intercept column.
    pub fn without_intercept(mut self) -> Self {
        self.intercept = false;
        self
    }

    /// All column names used by the model (outcome included), sorted and
    /// deduplicated. Complete-case filtering is taken over these columns.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = std::iter::once(self.outcome.column.as_str())
            .chain(self.terms.iter().map(|t| t.column.as_str()))
            .collect();
        vars.sort();
        vars.dedup();
        vars
    }
}

impl std::fmt::Display for FormulaSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ~ ", self.outcome)?;
        if !self.intercept {
            write!(f, "0 + ")?;
        }
        if self.terms.is_empty() {
            write!(f, "1")
        } else {
            let term_strs: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
            write!(f, "{}", term_strs.join(" + "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple() {
        let spec = FormulaSpec::new(TermSpec::standardized("sbp"))
            .with_term(TermSpec::standardized("cadmium"))
            .with_term(TermSpec::new("age"));
        assert!(spec.intercept);
        assert_eq!(spec.terms.len(), 2);
        assert_eq!(spec.terms[0].transform, Transform::Standardize);
        assert_eq!(spec.terms[1].transform, Transform::Identity);
    }

    #[test]
    fn test_display() {
        let spec = FormulaSpec::new(TermSpec::standardized("sbp"))
            .with_term(TermSpec::logged("cadmium"))
            .with_term(TermSpec::new("sex"));
        assert_eq!(spec.to_string(), "std(sbp) ~ log(cadmium) + sex");
    }

    #[test]
    fn test_display_intercept_only() {
        let spec = FormulaSpec::new(TermSpec::new("sbp"));
        assert_eq!(spec.to_string(), "sbp ~ 1");
    }

    #[test]
    fn test_display_no_intercept() {
        let spec = FormulaSpec::new(TermSpec::new("sbp"))
            .with_term(TermSpec::new("age"))
            .without_intercept();
        assert_eq!(spec.to_string(), "sbp ~ 0 + age");
    }

    #[test]
    fn test_variables() {
        let spec = FormulaSpec::new(TermSpec::standardized("sbp"))
            .with_term(TermSpec::standardized("cadmium"))
            .with_term(TermSpec::new("age"))
            .with_term(TermSpec::new("sex"));
        assert_eq!(spec.variables(), vec!["age", "cadmium", "sbp", "sex"]);
    }

    #[test]
    fn test_transform_yaml() {
        let yaml = serde_yaml::to_string(&Transform::Standardize).unwrap();
        assert_eq!(yaml.trim(), "standardize");

        let t: Transform = serde_yaml::from_str("log").unwrap();
        assert_eq!(t, Transform::Log);
    }
}
