//! Aggregated per-variant results and conversion inputs
//!
//! Aggregates are updated incrementally from conversion events, so memory
//! use is O(variants × metrics) rather than O(events). Raw events are not
//! retained after aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::Comparison;

/// Streaming aggregate of one metric for one variant.
///
/// Keeps count, running mean and Welford's M2, giving an unbiased sample
/// standard deviation without storing any raw values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricAggregate {
    count: u64,
    mean: f64,
    m2: f64,
}

impl MetricAggregate {
    /// Empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the aggregate:
    /// `new_mean = old_mean + (value - old_mean) / new_count`.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of observations folded in.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Running mean. Zero when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample standard deviation. Zero below two observations.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

/// A recorded event indicating a visitor achieved a tracked metric.
///
/// Ephemeral input to the aggregator; not persisted after folding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionEvent {
    /// Experiment the conversion belongs to.
    pub experiment_id: String,
    /// Variant the visitor was assigned to.
    pub variant_id: String,
    /// Visitor who converted.
    pub visitor_id: String,
    /// Metric name the event counts toward.
    pub metric: String,
    /// Metric value (1.0 for a plain conversion).
    pub value: f64,
    /// When the conversion happened.
    pub timestamp: DateTime<Utc>,
}

/// Sticky mapping of a visitor to a variant.
///
/// Created once and never recomputed for the lifetime of the experiment;
/// re-randomizing an existing assignment would bias results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitorAssignment {
    experiment_id: String,
    visitor_id: String,
    variant_id: String,
    bucket: u16,
    assigned_at: DateTime<Utc>,
}

impl VisitorAssignment {
    /// Create a new assignment record.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        visitor_id: impl Into<String>,
        variant_id: impl Into<String>,
        bucket: u16,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            visitor_id: visitor_id.into(),
            variant_id: variant_id.into(),
            bucket,
            assigned_at,
        }
    }

    /// Experiment id.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Visitor id.
    #[must_use]
    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    /// Assigned variant id.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Hash bucket in `0..10_000` the visitor fell into.
    #[must_use]
    pub const fn bucket(&self) -> u16 {
        self.bucket
    }

    /// Assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }
}

/// Continuously-mutated aggregate result for one variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantResult {
    experiment_id: String,
    variant_id: String,
    participants: u64,
    metrics: HashMap<String, MetricAggregate>,
    z_score: f64,
    p_value: f64,
    improvement: f64,
    confidence_interval: (f64, f64),
    is_significant: bool,
    is_winner: bool,
}

impl VariantResult {
    /// Zero-initialized result row, created at `start_experiment`.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            variant_id: variant_id.into(),
            participants: 0,
            metrics: HashMap::new(),
            z_score: 0.0,
            p_value: 1.0,
            improvement: 0.0,
            confidence_interval: (0.0, 0.0),
            is_significant: false,
            is_winner: false,
        }
    }

    /// Experiment id.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Variant id.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Number of recorded conversion events for the variant.
    #[must_use]
    pub const fn participants(&self) -> u64 {
        self.participants
    }

    /// Aggregate for the named metric, if any event has been recorded.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricAggregate> {
        self.metrics.get(name)
    }

    /// Observation count for the named metric (the `n` of the z-test).
    #[must_use]
    pub fn sample_size(&self, metric: &str) -> u64 {
        self.metrics.get(metric).map_or(0, MetricAggregate::count)
    }

    /// z-score vs. control for the primary metric.
    #[must_use]
    pub const fn z_score(&self) -> f64 {
        self.z_score
    }

    /// Two-tailed p-value vs. control.
    #[must_use]
    pub const fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Percentage lift of the primary metric vs. control.
    #[must_use]
    pub const fn improvement(&self) -> f64 {
        self.improvement
    }

    /// Confidence interval for the primary-metric mean.
    #[must_use]
    pub const fn confidence_interval(&self) -> (f64, f64) {
        self.confidence_interval
    }

    /// Whether `p_value < alpha` at the last analysis.
    #[must_use]
    pub const fn is_significant(&self) -> bool {
        self.is_significant
    }

    /// Whether this variant is the recommended winner.
    #[must_use]
    pub const fn is_winner(&self) -> bool {
        self.is_winner
    }

    /// Fold one conversion event into the aggregates.
    pub fn record(&mut self, metric: &str, value: f64) {
        self.participants += 1;
        self.metrics.entry(metric.to_string()).or_default().update(value);
    }

    /// Stamp the latest analyzer output onto the result.
    pub fn apply_comparison(&mut self, comparison: &Comparison) {
        self.z_score = comparison.z_score;
        self.p_value = comparison.p_value;
        self.improvement = comparison.improvement;
        self.confidence_interval = comparison.confidence_interval;
        self.is_significant = comparison.is_significant;
    }

    /// Mark or clear the winner flag.
    pub fn set_winner(&mut self, is_winner: bool) {
        self.is_winner = is_winner;
    }

    /// Copy the statistical fields from an analyzed row, leaving the
    /// aggregates (`participants`, `metrics`) untouched. Stores use this
    /// so an analysis write-back never clobbers conversions recorded
    /// after the analyzer took its snapshot.
    pub fn copy_statistics_from(&mut self, analyzed: &Self) {
        self.z_score = analyzed.z_score;
        self.p_value = analyzed.p_value;
        self.improvement = analyzed.improvement;
        self.confidence_interval = analyzed.confidence_interval;
        self.is_significant = analyzed.is_significant;
        self.is_winner = analyzed.is_winner;
    }
}

/// Derived recommendation for an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// No variant shows a significant positive lift over control.
    Inconclusive,
    /// A leading variant exists but its sample size is below the minimum.
    ContinueTesting,
    /// A significant winner with sufficient sample size exists.
    AdoptWinner,
}

/// Snapshot of an experiment's analysis: per-variant statistics, the
/// recommended action and the winner (if any).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    experiment_id: String,
    computed_at: DateTime<Utc>,
    variant_results: Vec<VariantResult>,
    winner: Option<String>,
    recommendation: Recommendation,
}

impl AnalysisResult {
    /// Assemble an analysis snapshot. Variant results are ordered by
    /// variant id for deterministic output.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        computed_at: DateTime<Utc>,
        mut variant_results: Vec<VariantResult>,
        winner: Option<String>,
        recommendation: Recommendation,
    ) -> Self {
        variant_results.sort_by(|a, b| a.variant_id().cmp(b.variant_id()));
        Self {
            experiment_id: experiment_id.into(),
            computed_at,
            variant_results,
            winner,
            recommendation,
        }
    }

    /// Experiment id.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// When the analysis was computed.
    #[must_use]
    pub const fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    /// Per-variant statistics, ordered by variant id.
    #[must_use]
    pub fn variant_results(&self) -> &[VariantResult] {
        &self.variant_results
    }

    /// Result row for one variant.
    #[must_use]
    pub fn result_for(&self, variant_id: &str) -> Option<&VariantResult> {
        self.variant_results.iter().find(|r| r.variant_id() == variant_id)
    }

    /// Winning variant id, if one is recommended.
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Recommended action.
    #[must_use]
    pub const fn recommendation(&self) -> Recommendation {
        self.recommendation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_mean_matches_batch_mean() {
        let values = [0.5, 1.5, 2.0, 4.0, 7.0];
        let mut agg = MetricAggregate::new();
        for v in values {
            agg.update(v);
        }

        let batch_mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((agg.mean() - batch_mean).abs() < 1e-12);
        assert_eq!(agg.count(), 5);
    }

    #[test]
    fn welford_std_dev_matches_two_pass() {
        let values = [0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mut agg = MetricAggregate::new();
        for v in values {
            agg.update(v);
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        assert!((agg.std_dev() - var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn std_dev_is_zero_below_two_observations() {
        let mut agg = MetricAggregate::new();
        assert_eq!(agg.std_dev(), 0.0);
        agg.update(3.0);
        assert_eq!(agg.std_dev(), 0.0);
    }

    #[test]
    fn variant_result_records_per_metric() {
        let mut result = VariantResult::new("exp-1", "v1");
        result.record("conversion", 1.0);
        result.record("conversion", 0.0);
        result.record("revenue", 12.5);

        assert_eq!(result.participants(), 3);
        assert_eq!(result.sample_size("conversion"), 2);
        assert_eq!(result.sample_size("revenue"), 1);
        assert_eq!(result.sample_size("bounce"), 0);
        assert!((result.metric("conversion").unwrap().mean() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn analysis_result_orders_variants() {
        let results = vec![
            VariantResult::new("exp-1", "v2"),
            VariantResult::new("exp-1", "control"),
            VariantResult::new("exp-1", "v1"),
        ];
        let analysis = AnalysisResult::new(
            "exp-1",
            Utc::now(),
            results,
            None,
            Recommendation::Inconclusive,
        );

        let ids: Vec<&str> = analysis.variant_results().iter().map(VariantResult::variant_id).collect();
        assert_eq!(ids, vec!["control", "v1", "v2"]);
        assert!(analysis.result_for("v1").is_some());
        assert!(analysis.result_for("nope").is_none());
    }

    #[test]
    fn recommendation_wire_names() {
        assert_eq!(
            serde_json::to_string(&Recommendation::ContinueTesting).unwrap(),
            "\"continue_testing\""
        );
        assert_eq!(
            serde_json::to_string(&Recommendation::Inconclusive).unwrap(),
            "\"inconclusive\""
        );
    }
}
