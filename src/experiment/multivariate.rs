//! Multivariate test generation
//!
//! Expands a factor list into the Cartesian product of all factor-value
//! tuples. Cardinality is the product of each factor's value count, so the
//! expansion is capped to guard against combinatorial explosion.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::experiment::{ExperimentConfig, Variant};

/// Default cap on generated variants.
pub const DEFAULT_MAX_VARIANTS: usize = 20;

/// One independent dimension of a multivariate test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Factor {
    name: String,
    values: Vec<String>,
}

impl Factor {
    /// Create a factor from its name and candidate values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Factor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Shared settings applied to a generated multivariate experiment.
#[derive(Debug, Clone)]
pub struct MultivariateSettings {
    /// Primary success metric name.
    pub primary_metric: String,
    /// Secondary metric names.
    pub secondary_metrics: Vec<String>,
    /// Significance level α.
    pub alpha: f64,
    /// Minimum sample size per variant.
    pub minimum_sample_size: u64,
    /// Minimum detectable effect.
    pub minimum_detectable_effect: f64,
    /// Duration in days.
    pub duration_days: u32,
    /// Creator, if recorded.
    pub created_by: Option<String>,
    /// Cap on generated variants; exceeding it fails validation.
    pub max_variants: usize,
}

impl MultivariateSettings {
    /// Settings with the given primary metric and standard defaults
    /// elsewhere (α = 0.05, minimum sample size 100, 14 days).
    #[must_use]
    pub fn new(primary_metric: impl Into<String>) -> Self {
        Self {
            primary_metric: primary_metric.into(),
            secondary_metrics: Vec::new(),
            alpha: 0.05,
            minimum_sample_size: 100,
            minimum_detectable_effect: 0.05,
            duration_days: 14,
            created_by: None,
            max_variants: DEFAULT_MAX_VARIANTS,
        }
    }
}

/// Recursively build the Cartesian product of factor values: for each value
/// of the first factor, every combination of the remaining factors.
fn combinations(factors: &[Factor]) -> Vec<Vec<(String, String)>> {
    let Some((head, tail)) = factors.split_first() else {
        return vec![Vec::new()];
    };
    let rest = combinations(tail);
    let mut out = Vec::with_capacity(head.values.len() * rest.len());
    for value in &head.values {
        for combo in &rest {
            let mut with_value = Vec::with_capacity(combo.len() + 1);
            with_value.push((head.name.clone(), value.clone()));
            with_value.extend(combo.iter().cloned());
            out.push(with_value);
        }
    }
    out
}

/// Expand factors into variants with equal traffic split.
///
/// The first generated combination becomes the control. Each variant's
/// payload is a JSON object mapping factor names to the chosen values.
///
/// # Errors
///
/// Returns [`Error::Validation`] when no factor has values or the expansion
/// exceeds `max_variants`.
pub fn expand_factors(factors: &[Factor], max_variants: usize) -> Result<Vec<Variant>> {
    if factors.is_empty() || factors.iter().any(|f| f.values.is_empty()) {
        return Err(Error::validation(vec![
            "every factor must provide at least one value".to_string(),
        ]));
    }

    let cardinality: usize = factors.iter().map(|f| f.values.len()).product();
    if cardinality > max_variants {
        return Err(Error::validation(vec![format!(
            "factor expansion produces {cardinality} variants, exceeding the cap of {max_variants}"
        )]));
    }

    let combos = combinations(factors);
    let split = 100.0 / combos.len() as f64;

    let variants = combos
        .into_iter()
        .enumerate()
        .map(|(i, combo)| {
            let name = combo
                .iter()
                .map(|(factor, value)| format!("{factor}={value}"))
                .collect::<Vec<_>>()
                .join(", ");
            let payload = serde_json::Value::Object(
                combo
                    .into_iter()
                    .map(|(factor, value)| (factor, serde_json::Value::String(value)))
                    .collect(),
            );
            Variant::new(format!("v{}", i + 1), name, i == 0, split).with_payload(payload)
        })
        .collect();

    Ok(variants)
}

/// Build a full experiment configuration from a factor list.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the expansion fails (see
/// [`expand_factors`]).
pub fn multivariate_config(
    name: impl Into<String>,
    factors: &[Factor],
    settings: &MultivariateSettings,
) -> Result<ExperimentConfig> {
    let variants = expand_factors(factors, settings.max_variants)?;
    let mut builder = ExperimentConfig::builder(name, settings.primary_metric.clone())
        .variants(variants)
        .alpha(settings.alpha)
        .minimum_sample_size(settings.minimum_sample_size)
        .minimum_detectable_effect(settings.minimum_detectable_effect)
        .duration_days(settings.duration_days);
    for metric in &settings.secondary_metrics {
        builder = builder.secondary_metric(metric.clone());
    }
    if let Some(creator) = &settings.created_by {
        builder = builder.created_by(creator.clone());
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline_and_cta() -> Vec<Factor> {
        vec![
            Factor::new("headline", vec!["A".to_string(), "B".to_string()]),
            Factor::new(
                "cta",
                vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
            ),
        ]
    }

    #[test]
    fn two_by_three_yields_six_variants() {
        let variants = expand_factors(&headline_and_cta(), DEFAULT_MAX_VARIANTS).unwrap();
        assert_eq!(variants.len(), 6);

        let controls = variants.iter().filter(|v| v.is_control()).count();
        assert_eq!(controls, 1);
        assert!(variants[0].is_control());

        for variant in &variants {
            assert!((variant.traffic_percent() - 100.0 / 6.0).abs() < 0.01);
        }
        let sum: f64 = variants.iter().map(Variant::traffic_percent).sum();
        assert!((sum - 100.0).abs() < 0.01);
    }

    #[test]
    fn combination_order_is_first_factor_major() {
        let variants = expand_factors(&headline_and_cta(), DEFAULT_MAX_VARIANTS).unwrap();
        assert_eq!(variants[0].name(), "headline=A, cta=X");
        assert_eq!(variants[1].name(), "headline=A, cta=Y");
        assert_eq!(variants[3].name(), "headline=B, cta=X");
    }

    #[test]
    fn payload_carries_factor_values() {
        let variants = expand_factors(&headline_and_cta(), DEFAULT_MAX_VARIANTS).unwrap();
        let payload = variants[4].payload().unwrap();
        assert_eq!(payload["headline"], "B");
        assert_eq!(payload["cta"], "Y");
    }

    #[test]
    fn explosion_is_capped() {
        let factors = vec![
            Factor::new("a", (0..5).map(|i| i.to_string()).collect()),
            Factor::new("b", (0..5).map(|i| i.to_string()).collect()),
        ];
        let err = expand_factors(&factors, 20).unwrap_err();
        assert!(err.violations().iter().any(|v| v.contains("cap")));
    }

    #[test]
    fn empty_factor_values_fail() {
        let factors = vec![Factor::new("a", Vec::new())];
        assert!(expand_factors(&factors, 20).is_err());
    }

    #[test]
    fn generated_config_validates() {
        let settings = MultivariateSettings::new("conversion");
        let config = multivariate_config("landing page", &headline_and_cta(), &settings).unwrap();
        assert!(crate::experiment::validate(&config).is_ok());
        assert_eq!(config.variants().len(), 6);
    }
}
