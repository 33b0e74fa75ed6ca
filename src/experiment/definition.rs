//! Experiment and variant definitions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle status of an experiment.
///
/// Transitions: `Draft → Running → Stopped → Completed`. The monitor may
/// drive `Running → Stopped` on duration expiry or early significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Created and validated, not yet receiving traffic.
    Draft,
    /// Receiving traffic; assignments and conversions are accepted.
    Running,
    /// No longer receiving traffic; final statistics are frozen.
    Stopped,
    /// Stopped and acknowledged; a winner has been adopted.
    Completed,
}

/// Why an experiment was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Stopped by an explicit caller request.
    Manual,
    /// The configured duration elapsed.
    DurationComplete,
    /// Significance reached before the duration elapsed.
    EarlyStoppingSignificance,
}

/// One configuration under test.
///
/// The payload is opaque to the engine: headline, CTA text, model
/// parameters, whatever the caller is varying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    id: String,
    name: String,
    is_control: bool,
    traffic_percent: f64,
    payload: Option<serde_json::Value>,
}

impl Variant {
    /// Create a new variant.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        is_control: bool,
        traffic_percent: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_control,
            traffic_percent,
            payload: None,
        }
    }

    /// Attach an opaque content payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Variant id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable variant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this variant is the control baseline.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.is_control
    }

    /// Configured share of traffic, in percent.
    #[must_use]
    pub const fn traffic_percent(&self) -> f64 {
        self.traffic_percent
    }

    /// Opaque content payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }
}

/// Experiment configuration, gated by the validator at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    name: String,
    variants: Vec<Variant>,
    traffic_split: Vec<f64>,
    primary_metric: String,
    secondary_metrics: Vec<String>,
    alpha: f64,
    minimum_sample_size: u64,
    minimum_detectable_effect: f64,
    duration_days: u32,
    created_by: Option<String>,
}

impl ExperimentConfig {
    /// Create a builder with the required name and primary metric.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        primary_metric: impl Into<String>,
    ) -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::new(name, primary_metric)
    }

    /// Experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variants under test, in configured order.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Traffic split percentages, aligned 1:1 with [`Self::variants`].
    #[must_use]
    pub fn traffic_split(&self) -> &[f64] {
        &self.traffic_split
    }

    /// Name of the primary success metric.
    #[must_use]
    pub fn primary_metric(&self) -> &str {
        &self.primary_metric
    }

    /// Secondary metric names.
    #[must_use]
    pub fn secondary_metrics(&self) -> &[String] {
        &self.secondary_metrics
    }

    /// Significance level α.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Minimum sample size required before a winner can be adopted.
    #[must_use]
    pub const fn minimum_sample_size(&self) -> u64 {
        self.minimum_sample_size
    }

    /// Smallest effect worth detecting, as a fraction of the control rate.
    #[must_use]
    pub const fn minimum_detectable_effect(&self) -> f64 {
        self.minimum_detectable_effect
    }

    /// Configured experiment duration in days.
    #[must_use]
    pub const fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Creator of the experiment, if recorded.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// The control variant, if exactly one is configured.
    #[must_use]
    pub fn control_variant(&self) -> Option<&Variant> {
        let mut controls = self.variants.iter().filter(|v| v.is_control());
        let first = controls.next()?;
        if controls.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// Per-variant participant threshold that triggers a statistics refresh.
    #[must_use]
    pub fn per_variant_threshold(&self) -> u64 {
        let count = self.variants.len().max(1) as u64;
        self.minimum_sample_size / count
    }
}

/// Builder for [`ExperimentConfig`].
#[derive(Debug)]
pub struct ExperimentConfigBuilder {
    name: String,
    variants: Vec<Variant>,
    traffic_split: Option<Vec<f64>>,
    primary_metric: String,
    secondary_metrics: Vec<String>,
    alpha: f64,
    minimum_sample_size: u64,
    minimum_detectable_effect: f64,
    duration_days: u32,
    created_by: Option<String>,
}

impl ExperimentConfigBuilder {
    /// Create a new builder with required fields and standard defaults
    /// (α = 0.05, minimum sample size 100, duration 14 days).
    #[must_use]
    pub fn new(name: impl Into<String>, primary_metric: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
            traffic_split: None,
            primary_metric: primary_metric.into(),
            secondary_metrics: Vec::new(),
            alpha: 0.05,
            minimum_sample_size: 100,
            minimum_detectable_effect: 0.05,
            duration_days: 14,
            created_by: None,
        }
    }

    /// Add a variant.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Replace the variant list.
    #[must_use]
    pub fn variants(mut self, variants: Vec<Variant>) -> Self {
        self.variants = variants;
        self
    }

    /// Set an explicit traffic split. When omitted, the split is derived
    /// from each variant's configured traffic percentage.
    #[must_use]
    pub fn traffic_split(mut self, split: Vec<f64>) -> Self {
        self.traffic_split = Some(split);
        self
    }

    /// Add a secondary metric.
    #[must_use]
    pub fn secondary_metric(mut self, metric: impl Into<String>) -> Self {
        self.secondary_metrics.push(metric.into());
        self
    }

    /// Set the significance level α.
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the minimum sample size per variant.
    #[must_use]
    pub const fn minimum_sample_size(mut self, n: u64) -> Self {
        self.minimum_sample_size = n;
        self
    }

    /// Set the minimum detectable effect.
    #[must_use]
    pub const fn minimum_detectable_effect(mut self, mde: f64) -> Self {
        self.minimum_detectable_effect = mde;
        self
    }

    /// Set the duration in days.
    #[must_use]
    pub const fn duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }

    /// Record the creator.
    #[must_use]
    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    /// Build the configuration. Structural correctness is checked by the
    /// validator at `create_experiment`, not here.
    #[must_use]
    pub fn build(self) -> ExperimentConfig {
        let traffic_split = self
            .traffic_split
            .unwrap_or_else(|| self.variants.iter().map(Variant::traffic_percent).collect());
        ExperimentConfig {
            name: self.name,
            variants: self.variants,
            traffic_split,
            primary_metric: self.primary_metric,
            secondary_metrics: self.secondary_metrics,
            alpha: self.alpha,
            minimum_sample_size: self.minimum_sample_size,
            minimum_detectable_effect: self.minimum_detectable_effect,
            duration_days: self.duration_days,
            created_by: self.created_by,
        }
    }
}

/// A configured comparison of variants against success metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    id: String,
    config: ExperimentConfig,
    status: ExperimentStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    stop_reason: Option<StopReason>,
}

impl Experiment {
    /// Create a new Draft experiment with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>, config: ExperimentConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            config,
            status: ExperimentStatus::Draft,
            created_at,
            started_at: None,
            end_date: None,
            stopped_at: None,
            stop_reason: None,
        }
    }

    /// Experiment id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Experiment configuration.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Start timestamp, if the experiment has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Scheduled end (start + duration), if the experiment has started.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Stop timestamp, if the experiment has stopped.
    #[must_use]
    pub const fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    /// Why the experiment stopped, if it has.
    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// True once `now` is past the scheduled end date.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }

    /// Transition Draft → Running, stamping the start and end dates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the experiment is in Draft.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ExperimentStatus::Draft {
            return Err(Error::InvalidState(format!(
                "experiment {} cannot start from {:?}",
                self.id, self.status
            )));
        }
        self.status = ExperimentStatus::Running;
        self.started_at = Some(now);
        self.end_date = Some(now + Duration::days(i64::from(self.config.duration_days)));
        Ok(())
    }

    /// Transition Running → Stopped with the given reason.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the experiment is Running. Idempotency
    /// of repeated stop calls is handled by the engine, which never calls
    /// this on an already-stopped experiment.
    pub fn stop(&mut self, reason: StopReason, now: DateTime<Utc>) -> Result<()> {
        if self.status != ExperimentStatus::Running {
            return Err(Error::InvalidState(format!(
                "experiment {} cannot stop from {:?}",
                self.id, self.status
            )));
        }
        self.status = ExperimentStatus::Stopped;
        self.stopped_at = Some(now);
        self.stop_reason = Some(reason);
        Ok(())
    }

    /// Transition Stopped → Completed (winner adopted by the caller).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the experiment is Stopped.
    pub fn complete(&mut self) -> Result<()> {
        if self.status != ExperimentStatus::Stopped {
            return Err(Error::InvalidState(format!(
                "experiment {} cannot complete from {:?}",
                self.id, self.status
            )));
        }
        self.status = ExperimentStatus::Completed;
        Ok(())
    }
}
