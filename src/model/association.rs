//! One exposure, one survey-weighted regression.

use crate::data::{AssociationResult, FormulaSpec, TermSpec};
use crate::design::{fit_wls, SurveyDesign};
use crate::error::{Result, XwasError};

/// Build the screening model for one exposure.
///
/// The outcome and the exposure are both standardized over the analyzed
/// sample, so the exposure coefficient reads "outcome SDs per exposure
/// SD". Adjustment covariates enter on their original scale; categorical
/// covariates are dummy-coded at fit time.
pub fn association_formula(
    outcome: &str,
    exposure: &str,
    adjustments: &[String],
) -> FormulaSpec {
    let mut spec = FormulaSpec::new(TermSpec::standardized(outcome))
        .with_term(TermSpec::standardized(exposure));
    for covariate in adjustments {
        spec = spec.with_term(TermSpec::new(covariate.clone()));
    }
    spec
}

/// Fit one association model and tag every term row with the exposure.
///
/// Returns one [`AssociationResult`] per coefficient, intercept and
/// adjustment covariates included; the screen strips the non-exposure
/// rows afterwards. Rank deficiency (constant exposure, perfect
/// collinearity, zero residual variance on the exposure term) surfaces
/// as [`XwasError::SingularFit`] naming the exposure, so the screen can
/// record it and continue.
pub fn fit_association(
    design: &SurveyDesign,
    exposure: &str,
    spec: &FormulaSpec,
) -> Result<Vec<AssociationResult>> {
    let fit = fit_wls(design, spec).map_err(|e| match e {
        // a singular X'WX here means the exposure is collinear with the
        // adjustment set; attribute it to the exposure under test
        XwasError::Numerical(reason) => XwasError::SingularFit {
            variable: exposure.to_string(),
            reason,
        },
        other => other,
    })?;

    let results: Vec<AssociationResult> = fit
        .coefficients
        .iter()
        .map(|c| AssociationResult {
            exposure: exposure.to_string(),
            term: c.term.clone(),
            source: c.source.clone(),
            estimate: c.estimate,
            std_error: c.std_error,
            statistic: c.statistic,
            p_value: c.p_value,
            df: fit.df,
            n_obs: fit.n_obs,
        })
        .collect();

    // a degenerate exposure coefficient is a failed fit, not a result
    let own = results
        .iter()
        .find(|r| r.source == exposure)
        .ok_or_else(|| XwasError::SingularFit {
            variable: exposure.to_string(),
            reason: "exposure term absent from the fitted model".to_string(),
        })?;
    if !(own.std_error > 0.0) || !own.p_value.is_finite() {
        return Err(XwasError::SingularFit {
            variable: exposure.to_string(),
            reason: "degenerate standard error for the exposure term".to_string(),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Dataset, Transform};

    fn srs_design(columns: Vec<(String, Column)>) -> SurveyDesign {
        let n = columns[0].1.len();
        let mut all = vec![
            ("stratum".to_string(), Column::Numeric(vec![1.0; n])),
            (
                "psu".to_string(),
                Column::Numeric((1..=n).map(|i| i as f64).collect()),
            ),
            ("weight".to_string(), Column::Numeric(vec![1.0; n])),
        ];
        all.extend(columns);
        let data = Dataset::new((1..=n).map(|i| format!("P{}", i)).collect(), all).unwrap();
        SurveyDesign::new(data, "stratum", "psu", "weight").unwrap()
    }

    #[test]
    fn test_formula_shape() {
        let spec = association_formula(
            "telomere",
            "cadmium",
            &["age".to_string(), "sex".to_string()],
        );

        assert_eq!(spec.outcome.column, "telomere");
        assert_eq!(spec.outcome.transform, Transform::Standardize);
        assert_eq!(spec.terms.len(), 3);
        assert_eq!(spec.terms[0].column, "cadmium");
        assert_eq!(spec.terms[0].transform, Transform::Standardize);
        assert_eq!(spec.terms[1].transform, Transform::Identity);
        assert_eq!(
            spec.to_string(),
            "std(telomere) ~ std(cadmium) + age + sex"
        );
    }

    #[test]
    fn test_fit_tags_every_row() {
        let design = srs_design(vec![
            (
                "telomere".to_string(),
                Column::Numeric(vec![1.1, 0.9, 1.3, 0.8, 1.2, 1.0, 1.4, 0.7]),
            ),
            (
                "cadmium".to_string(),
                Column::Numeric(vec![0.2, 0.9, 0.1, 1.1, 0.3, 0.8, 0.2, 1.3]),
            ),
            (
                "age".to_string(),
                Column::Numeric(vec![31.0, 44.0, 52.0, 29.0, 61.0, 38.0, 47.0, 55.0]),
            ),
        ]);

        let spec = association_formula("telomere", "cadmium", &["age".to_string()]);
        let rows = fit_association(&design, "cadmium", &spec).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.exposure == "cadmium"));
        let terms: Vec<&str> = rows.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["(Intercept)", "std(cadmium)", "age"]);
    }

    #[test]
    fn test_constant_exposure_is_singular() {
        let design = srs_design(vec![
            (
                "telomere".to_string(),
                Column::Numeric(vec![1.1, 0.9, 1.3, 0.8, 1.2, 1.0]),
            ),
            (
                "cotinine".to_string(),
                Column::Numeric(vec![0.5; 6]),
            ),
        ]);

        let spec = association_formula("telomere", "cotinine", &[]);
        match fit_association(&design, "cotinine", &spec) {
            Err(XwasError::SingularFit { variable, .. }) => assert_eq!(variable, "cotinine"),
            other => panic!("expected SingularFit, got {:?}", other),
        }
    }

    #[test]
    fn test_collinear_exposure_is_singular() {
        let age = vec![31.0, 44.0, 52.0, 29.0, 61.0, 38.0, 47.0, 55.0];
        let design = srs_design(vec![
            (
                "telomere".to_string(),
                Column::Numeric(vec![1.1, 0.9, 1.3, 0.8, 1.2, 1.0, 1.4, 0.7]),
            ),
            ("age".to_string(), Column::Numeric(age.clone())),
            (
                "age_months".to_string(),
                Column::Numeric(age.iter().map(|a| a * 12.0).collect()),
            ),
        ]);

        let spec = association_formula("telomere", "age_months", &["age".to_string()]);
        match fit_association(&design, "age_months", &spec) {
            Err(XwasError::SingularFit { variable, .. }) => assert_eq!(variable, "age_months"),
            other => panic!("expected SingularFit, got {:?}", other),
        }
    }
}
