//! Synthetic survey data with known ground truth.
//!
//! Generates stratified, clustered, weighted participant datasets for
//! validating the screening pipeline.

use crate::data::{Column, DataDictionary, Dataset, ExposureVariable};
use crate::error::{Result, XwasError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for synthetic survey generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Name/identifier for this dataset.
    pub name: String,
    /// Number of participants.
    pub n_rows: usize,
    /// Number of sampling strata.
    pub n_strata: usize,
    /// Number of PSUs sampled per stratum.
    pub n_psus_per_stratum: usize,
    /// Number of exposures truly associated with the outcome.
    pub n_associated: usize,
    /// Number of pure-noise exposures.
    pub n_null: usize,
    /// Effect size for associated exposures, in outcome SDs per latent SD.
    pub effect_size: f64,
    /// Log-scale spread of the lognormal biomarker readings.
    pub biomarker_sigma: f64,
    /// Sampling weight range (min, max); equal values give uniform weights.
    pub weight_range: (f64, f64),
    /// Proportion of exposure readings set missing (0.0-1.0).
    pub missing_rate: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            n_rows: 200,
            n_strata: 4,
            n_psus_per_stratum: 3,
            n_associated: 2,
            n_null: 1,
            effect_size: 0.5,
            biomarker_sigma: 0.5,
            weight_range: (1.0, 1.0),
            missing_rate: 0.0,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Create a new config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the number of participants.
    pub fn with_rows(mut self, n_rows: usize) -> Self {
        self.n_rows = n_rows;
        self
    }

    /// Set the sampling structure.
    pub fn with_design(mut self, n_strata: usize, n_psus_per_stratum: usize) -> Self {
        self.n_strata = n_strata;
        self.n_psus_per_stratum = n_psus_per_stratum;
        self
    }

    /// Set the exposure panel.
    pub fn with_exposures(mut self, n_associated: usize, n_null: usize) -> Self {
        self.n_associated = n_associated;
        self.n_null = n_null;
        self
    }

    /// Set the effect size for associated exposures.
    pub fn with_effect_size(mut self, effect_size: f64) -> Self {
        self.effect_size = effect_size;
        self
    }

    /// Set the sampling weight range.
    pub fn with_weights(mut self, min: f64, max: f64) -> Self {
        self.weight_range = (min, max);
        self
    }

    /// Set the exposure missingness rate.
    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Ground truth for a synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Exposures truly associated with the outcome.
    pub associated: Vec<String>,
    /// True effect sizes, outcome SDs per latent exposure SD.
    pub effects: HashMap<String, f64>,
    /// Exposures with no true association.
    pub null: Vec<String>,
}

impl GroundTruth {
    /// Check whether an exposure is truly associated.
    pub fn is_associated(&self, exposure: &str) -> bool {
        self.associated.iter().any(|e| e == exposure)
    }

    /// True effect for an exposure (0.0 for null exposures).
    pub fn effect(&self, exposure: &str) -> f64 {
        self.effects.get(exposure).copied().unwrap_or(0.0)
    }
}

/// A generated dataset with its dictionary and ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    /// Participant dataset including outcome, exposures, covariates, and
    /// the survey design columns `stratum`, `psu`, `weight`.
    pub data: Dataset,
    /// Dictionary covering every generated exposure.
    pub dictionary: DataDictionary,
    /// Which exposures are real.
    pub truth: GroundTruth,
}

/// Simple deterministic RNG (xorshift64).
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Standard normal via Box-Muller.
    fn next_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-10);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Generate a synthetic survey dataset with known ground truth.
///
/// Each associated exposure is a lognormal biomarker whose latent normal
/// drives the outcome with the configured effect size; null exposures
/// are independent lognormals. The outcome also carries small age and
/// sex effects plus unit-variance noise, so the adjustment covariates
/// are genuinely informative. Rows are laid out stratum by stratum with
/// PSUs nested inside, and a small shared PSU shift induces the
/// within-cluster correlation a design-based analysis exists for.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<SyntheticData> {
    if config.n_rows == 0 {
        return Err(XwasError::InvalidParameter(
            "Synthetic dataset needs at least one row".to_string(),
        ));
    }
    if config.n_strata == 0 || config.n_psus_per_stratum == 0 {
        return Err(XwasError::InvalidParameter(
            "Synthetic design needs at least one stratum and one PSU".to_string(),
        ));
    }
    if config.n_associated + config.n_null == 0 {
        return Err(XwasError::InvalidParameter(
            "Synthetic panel needs at least one exposure".to_string(),
        ));
    }

    let mut rng = Rng::new(config.seed);
    let n = config.n_rows;

    // design columns: contiguous blocks per stratum, PSUs cycling inside
    let rows_per_stratum = n.div_ceil(config.n_strata);
    let mut stratum = Vec::with_capacity(n);
    let mut psu = Vec::with_capacity(n);
    for i in 0..n {
        let s = (i / rows_per_stratum).min(config.n_strata - 1);
        stratum.push((s + 1) as f64);
        psu.push(((i % config.n_psus_per_stratum) + 1) as f64);
    }

    let (w_min, w_max) = config.weight_range;
    let weight: Vec<f64> = (0..n)
        .map(|_| w_min + (w_max - w_min) * rng.next_f64())
        .collect();

    // shared shift per PSU
    let mut psu_shift: HashMap<(u64, u64), f64> = HashMap::new();
    let shifts: Vec<f64> = (0..n)
        .map(|i| {
            *psu_shift
                .entry((stratum[i] as u64, psu[i] as u64))
                .or_insert_with(|| 0.2 * rng.next_normal())
        })
        .collect();

    let age: Vec<f64> = (0..n).map(|_| 20.0 + 50.0 * rng.next_f64()).collect();
    let sex: Vec<Option<String>> = (0..n)
        .map(|_| {
            Some(if rng.next_f64() < 0.5 {
                "female".to_string()
            } else {
                "male".to_string()
            })
        })
        .collect();

    let mut outcome: Vec<f64> = (0..n)
        .map(|i| {
            let sex_effect = if sex[i].as_deref() == Some("male") {
                -0.1
            } else {
                0.0
            };
            shifts[i] - 0.01 * (age[i] - 45.0) + sex_effect + rng.next_normal()
        })
        .collect();

    let mut columns: Vec<(String, Column)> = vec![
        ("stratum".to_string(), Column::Numeric(stratum)),
        ("psu".to_string(), Column::Numeric(psu)),
        ("weight".to_string(), Column::Numeric(weight)),
        ("age".to_string(), Column::Numeric(age)),
        ("sex".to_string(), Column::Categorical(sex)),
    ];

    let mut variables = Vec::new();
    let mut associated = Vec::new();
    let mut null = Vec::new();
    let mut effects = HashMap::new();

    for e in 0..config.n_associated + config.n_null {
        let is_real = e < config.n_associated;
        let name = if is_real {
            format!("biomarker_{:02}", e + 1)
        } else {
            format!("noise_{:02}", e - config.n_associated + 1)
        };

        let latent: Vec<f64> = (0..n).map(|_| rng.next_normal()).collect();
        let readings: Vec<f64> = latent
            .iter()
            .map(|&z| (config.biomarker_sigma * z).exp())
            .collect();

        if is_real {
            for (yi, &z) in outcome.iter_mut().zip(&latent) {
                *yi += config.effect_size * z;
            }
            associated.push(name.clone());
            effects.insert(name.clone(), config.effect_size);
        } else {
            null.push(name.clone());
        }

        let readings = if config.missing_rate > 0.0 {
            readings
                .into_iter()
                .map(|v| {
                    if rng.next_f64() < config.missing_rate {
                        f64::NAN
                    } else {
                        v
                    }
                })
                .collect()
        } else {
            readings
        };

        variables.push(ExposureVariable {
            name: name.clone(),
            category: if is_real { "biomarkers" } else { "noise" }.to_string(),
            description: format!("Synthetic exposure {}", name),
        });
        columns.push((name, Column::Numeric(readings)));
    }

    columns.insert(5, ("telomere".to_string(), Column::Numeric(outcome)));

    let data = Dataset::new((1..=n).map(|i| format!("P{}", i)).collect(), columns)?;

    Ok(SyntheticData {
        data,
        dictionary: DataDictionary::new(variables),
        truth: GroundTruth {
            associated,
            effects,
            null,
        },
    })
}
