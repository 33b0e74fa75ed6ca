//! Structural validation of experiment configurations
//!
//! The validator accumulates **all** violations instead of failing fast, so
//! a caller gets the complete list in one round trip. It has no side
//! effects and gates both `create_experiment` and `start_experiment`.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::experiment::ExperimentConfig;

/// Tolerance on the traffic-split sum: percentages must total 100 ± 0.01.
pub const SPLIT_SUM_TOLERANCE: f64 = 0.01;

/// Allowed experiment duration range, in days.
pub const DURATION_RANGE: std::ops::RangeInclusive<u32> = 1..=90;

/// Smallest allowed minimum sample size.
pub const MIN_SAMPLE_SIZE_FLOOR: u64 = 100;

/// Check a configuration, returning every violation found.
#[must_use]
pub fn violations(config: &ExperimentConfig) -> Vec<String> {
    let mut found = Vec::new();

    if config.name().trim().is_empty() {
        found.push("experiment name must not be empty".to_string());
    }

    if config.variants().len() < 2 {
        found.push(format!(
            "at least two variants are required (found {})",
            config.variants().len()
        ));
    }

    let control_count = config.variants().iter().filter(|v| v.is_control()).count();
    if control_count != 1 {
        found.push(format!(
            "exactly one control variant is required (found {control_count})"
        ));
    }

    let mut seen = HashSet::new();
    for variant in config.variants() {
        if !seen.insert(variant.id()) {
            found.push(format!("duplicate variant id: {}", variant.id()));
        }
    }

    if config.primary_metric().trim().is_empty() {
        found.push("at least one success metric is required".to_string());
    }

    if config.traffic_split().len() != config.variants().len() {
        found.push(format!(
            "traffic split must have one entry per variant ({} entries for {} variants)",
            config.traffic_split().len(),
            config.variants().len()
        ));
    }

    let sum: f64 = config.traffic_split().iter().sum();
    if (sum - 100.0).abs() > SPLIT_SUM_TOLERANCE {
        found.push(format!("traffic split must sum to 100 (got {sum:.2})"));
    }

    if !DURATION_RANGE.contains(&config.duration_days()) {
        found.push(format!(
            "duration must be between 1 and 90 days (got {})",
            config.duration_days()
        ));
    }

    if config.minimum_sample_size() < MIN_SAMPLE_SIZE_FLOOR {
        found.push(format!(
            "minimum sample size must be at least {MIN_SAMPLE_SIZE_FLOOR} (got {})",
            config.minimum_sample_size()
        ));
    }

    found
}

/// Validate a configuration.
///
/// # Errors
///
/// Returns [`Error::Validation`] listing every violation when the
/// configuration is structurally invalid.
pub fn validate(config: &ExperimentConfig) -> Result<()> {
    let found = violations(config);
    if found.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Variant;

    fn valid_config() -> ExperimentConfig {
        ExperimentConfig::builder("cta test", "click_through")
            .variant(Variant::new("control", "Buy now", true, 50.0))
            .variant(Variant::new("v1", "Get started", false, 50.0))
            .build()
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn split_within_tolerance_passes() {
        let config = ExperimentConfig::builder("t", "m")
            .variant(Variant::new("control", "a", true, 33.33))
            .variant(Variant::new("v1", "b", false, 33.33))
            .variant(Variant::new("v2", "c", false, 33.34))
            .build();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn all_violations_reported_at_once() {
        // Empty name, single non-control variant, split does not sum to
        // 100, duration out of range, sample size too small.
        let config = ExperimentConfig::builder("", "metric")
            .variant(Variant::new("v1", "only", false, 40.0))
            .duration_days(120)
            .minimum_sample_size(10)
            .build();

        let err = validate(&config).unwrap_err();
        let violations = err.violations();
        assert!(violations.len() >= 5, "got: {violations:?}");
        assert!(violations.iter().any(|v| v.contains("name")));
        assert!(violations.iter().any(|v| v.contains("two variants")));
        assert!(violations.iter().any(|v| v.contains("control")));
        assert!(violations.iter().any(|v| v.contains("sum to 100")));
        assert!(violations.iter().any(|v| v.contains("duration")));
        assert!(violations.iter().any(|v| v.contains("sample size")));
    }

    #[test]
    fn split_off_by_more_than_tolerance_fails() {
        let config = ExperimentConfig::builder("t", "m")
            .variant(Variant::new("control", "a", true, 50.0))
            .variant(Variant::new("v1", "b", false, 50.0))
            .traffic_split(vec![50.0, 49.9])
            .build();

        let err = validate(&config).unwrap_err();
        assert!(err.violations().iter().any(|v| v.contains("sum to 100")));
    }

    #[test]
    fn split_length_mismatch_fails() {
        let config = ExperimentConfig::builder("t", "m")
            .variant(Variant::new("control", "a", true, 50.0))
            .variant(Variant::new("v1", "b", false, 50.0))
            .traffic_split(vec![100.0])
            .build();

        let err = validate(&config).unwrap_err();
        assert!(err.violations().iter().any(|v| v.contains("one entry per variant")));
    }

    #[test]
    fn duplicate_variant_ids_fail() {
        let config = ExperimentConfig::builder("t", "m")
            .variant(Variant::new("v1", "a", true, 50.0))
            .variant(Variant::new("v1", "b", false, 50.0))
            .build();

        let err = validate(&config).unwrap_err();
        assert!(err.violations().iter().any(|v| v.contains("duplicate variant id")));
    }

    #[test]
    fn two_controls_fail() {
        let config = ExperimentConfig::builder("t", "m")
            .variant(Variant::new("c1", "a", true, 50.0))
            .variant(Variant::new("c2", "b", true, 50.0))
            .build();

        let err = validate(&config).unwrap_err();
        assert!(err.violations().iter().any(|v| v.contains("exactly one control")));
    }
}
