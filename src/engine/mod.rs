//! Lifecycle controller: the public surface of the experimentation engine
//!
//! The engine owns the repository handle and clock explicitly; there is no
//! module-level registry. It is cheap to clone (`Arc` inner) so the monitor
//! task and request-serving call sites share one instance.
//!
//! Data flow: validator gates creation → Draft becomes Running at
//! `start_experiment` → the allocator assigns variants during traffic →
//! the recorder folds conversions into aggregates → the analyzer runs on
//! demand and on monitor ticks → the winner engine turns analysis into a
//! recommendation → the monitor may stop Running experiments on duration
//! expiry or early significance.

mod monitor;

pub use monitor::{Monitor, MonitorConfig};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocate;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::experiment::{
    multivariate, validate, AnalysisResult, ConversionEvent, Experiment, ExperimentConfig,
    ExperimentStatus, Factor, MetricAggregate, MultivariateSettings, StopReason,
    VisitorAssignment,
};
use crate::recommend;
use crate::stats::Analyzer;
use crate::store::ExperimentRepository;

struct EngineInner<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

/// Experimentation engine: validation, lifecycle, allocation, recording
/// and analysis behind one handle.
///
/// # Example
///
/// ```rust,no_run
/// use splitlab::{Engine, MemoryRepository};
/// use splitlab::experiment::{ExperimentConfig, Variant};
///
/// # async fn example() -> splitlab::Result<()> {
/// let engine = Engine::new(MemoryRepository::new());
///
/// let config = ExperimentConfig::builder("headline test", "conversion")
///     .variant(Variant::new("control", "Current headline", true, 50.0))
///     .variant(Variant::new("v1", "New headline", false, 50.0))
///     .build();
///
/// let experiment = engine.create_experiment(config).await?;
/// engine.start_experiment(experiment.id()).await?;
///
/// let variant = engine.assign_visitor(experiment.id(), "visitor-42").await?;
/// engine
///     .record_conversion(experiment.id(), &variant, "visitor-42", "conversion", 1.0)
///     .await?;
///
/// let analysis = engine.get_results(experiment.id()).await?;
/// println!("recommendation: {:?}", analysis.recommendation());
/// # Ok(())
/// # }
/// ```
pub struct Engine<R> {
    inner: Arc<EngineInner<R>>,
}

impl<R> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ExperimentRepository> Engine<R> {
    /// Create an engine over the given repository with the system clock.
    #[must_use]
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock (tests inject a
    /// [`crate::clock::ManualClock`] here).
    #[must_use]
    pub fn with_clock(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(EngineInner { repo, clock }),
        }
    }

    /// The repository handle.
    #[must_use]
    pub fn repo(&self) -> &R {
        &self.inner.repo
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.clock.now()
    }

    /// Validate and persist a new Draft experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with every violation when the
    /// configuration is structurally invalid.
    pub async fn create_experiment(&self, config: ExperimentConfig) -> Result<Experiment> {
        validate(&config)?;
        let experiment = Experiment::new(Uuid::new_v4().to_string(), config, self.now());
        self.inner.repo.insert_experiment(experiment.clone()).await?;
        info!(experiment_id = experiment.id(), name = experiment.config().name(), "created experiment");
        Ok(experiment)
    }

    /// Expand factors into a multivariate experiment and create it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the expansion is empty, exceeds
    /// the configured variant cap, or the generated config is invalid.
    pub async fn create_multivariate_experiment(
        &self,
        name: impl Into<String>,
        factors: &[Factor],
        settings: &MultivariateSettings,
    ) -> Result<Experiment> {
        let config = multivariate::multivariate_config(name, factors, settings)?;
        self.create_experiment(config).await
    }

    /// Transition Draft → Running: re-validate, stamp start/end dates and
    /// zero-initialize per-variant results.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless the experiment
    /// is in Draft, `Validation` if the config no longer validates.
    pub async fn start_experiment(&self, experiment_id: &str) -> Result<()> {
        let mut experiment = self.require_experiment(experiment_id).await?;
        validate(experiment.config())?;
        experiment.start(self.now())?;

        let variant_ids: Vec<String> = experiment
            .config()
            .variants()
            .iter()
            .map(|v| v.id().to_string())
            .collect();
        self.inner.repo.init_results(experiment_id, variant_ids).await?;
        self.inner.repo.update_experiment(experiment.clone()).await?;

        info!(
            experiment_id,
            end_date = %experiment.end_date().map(|d| d.to_rfc3339()).unwrap_or_default(),
            "started experiment"
        );
        Ok(())
    }

    /// Stop a Running experiment, computing and persisting its final
    /// analysis.
    ///
    /// Stopping an already-stopped experiment is a no-op that returns the
    /// frozen final analysis without touching `stopped_at`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` for a Draft experiment.
    pub async fn stop_experiment(
        &self,
        experiment_id: &str,
        reason: Option<StopReason>,
    ) -> Result<AnalysisResult> {
        let mut experiment = self.require_experiment(experiment_id).await?;

        match experiment.status() {
            ExperimentStatus::Stopped | ExperimentStatus::Completed => {
                debug!(experiment_id, "stop requested on stopped experiment; returning frozen analysis");
                return match self.inner.repo.get_analysis(experiment_id).await? {
                    Some(analysis) => Ok(analysis),
                    None => self.compute_analysis(&experiment).await,
                };
            }
            ExperimentStatus::Draft => {
                return Err(Error::InvalidState(format!(
                    "experiment {experiment_id} has not started"
                )));
            }
            ExperimentStatus::Running => {}
        }

        let analysis = self.compute_analysis(&experiment).await?;
        let reason = reason.unwrap_or(StopReason::Manual);
        experiment.stop(reason, self.now())?;
        self.inner.repo.update_experiment(experiment).await?;

        info!(experiment_id, ?reason, winner = ?analysis.winner(), "stopped experiment");
        Ok(analysis)
    }

    /// Mark a Stopped experiment Completed (winner adopted).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless Stopped.
    pub async fn complete_experiment(&self, experiment_id: &str) -> Result<()> {
        let mut experiment = self.require_experiment(experiment_id).await?;
        experiment.complete()?;
        self.inner.repo.update_experiment(experiment).await?;
        info!(experiment_id, "completed experiment");
        Ok(())
    }

    /// Deterministic, sticky assignment of a visitor to a variant.
    ///
    /// The first call persists the assignment; every later call replays the
    /// persisted value. Returns the assigned variant id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown experiment, `InvalidState` unless the
    /// experiment is Running.
    pub async fn assign_visitor(&self, experiment_id: &str, visitor_id: &str) -> Result<String> {
        let experiment = self.require_experiment(experiment_id).await?;
        if experiment.status() != ExperimentStatus::Running {
            return Err(Error::InvalidState(format!(
                "experiment {experiment_id} is not running (status: {:?})",
                experiment.status()
            )));
        }

        let bucket = allocate::bucket_of(experiment_id, visitor_id);
        let variant = allocate::choose_variant(
            bucket,
            experiment.config().variants(),
            experiment.config().traffic_split(),
        )
        .ok_or_else(|| Error::NotFound(format!("no variants in experiment {experiment_id}")))?;

        let assignment = VisitorAssignment::new(
            experiment_id,
            visitor_id,
            variant.id(),
            bucket,
            self.now(),
        );
        let stored = self.inner.repo.get_or_insert_assignment(assignment).await?;
        debug!(
            experiment_id,
            visitor_id,
            variant_id = stored.variant_id(),
            bucket = stored.bucket(),
            "assigned visitor"
        );
        Ok(stored.variant_id().to_string())
    }

    /// Fold a conversion event into the variant's aggregates.
    ///
    /// Conversions against an experiment that is no longer Running are
    /// logged as warnings and swallowed; they never disrupt the caller's
    /// request path. Once a variant crosses the per-variant sample
    /// threshold, statistics for the whole experiment are refreshed.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown experiment or variant id.
    pub async fn record_conversion(
        &self,
        experiment_id: &str,
        variant_id: &str,
        visitor_id: &str,
        metric: &str,
        value: f64,
    ) -> Result<()> {
        let experiment = self.require_experiment(experiment_id).await?;
        if experiment.status() != ExperimentStatus::Running {
            warn!(
                experiment_id,
                variant_id,
                visitor_id,
                status = ?experiment.status(),
                "conversion for inactive experiment dropped"
            );
            return Ok(());
        }

        if !experiment.config().variants().iter().any(|v| v.id() == variant_id) {
            return Err(Error::NotFound(format!(
                "variant {variant_id} in experiment {experiment_id}"
            )));
        }

        let updated = self
            .inner
            .repo
            .apply_conversion(experiment_id, variant_id, metric, value)
            .await?;

        if updated.participants() >= experiment.config().per_variant_threshold() {
            self.compute_analysis(&experiment).await?;
        }
        Ok(())
    }

    /// Record a conversion from an event struct. Equivalent to
    /// [`Self::record_conversion`]; the event's timestamp is informational.
    ///
    /// # Errors
    ///
    /// Same as [`Self::record_conversion`].
    pub async fn record_event(&self, event: ConversionEvent) -> Result<()> {
        self.record_conversion(
            &event.experiment_id,
            &event.variant_id,
            &event.visitor_id,
            &event.metric,
            event.value,
        )
        .await
    }

    /// Current analysis of an experiment, computed on demand.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Computation` when the experiment has
    /// never started (no result rows exist yet).
    pub async fn get_results(&self, experiment_id: &str) -> Result<AnalysisResult> {
        let experiment = self.require_experiment(experiment_id).await?;
        self.compute_analysis(&experiment).await
    }

    /// Observed assignment counts per variant, for checking split
    /// convergence.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn assignment_counts(&self, experiment_id: &str) -> Result<HashMap<String, u64>> {
        self.require_experiment(experiment_id).await?;
        self.inner.repo.assignment_counts(experiment_id).await
    }

    /// Fetch an experiment record.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.require_experiment(experiment_id).await
    }

    /// All Running experiments.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn running_experiments(&self) -> Result<Vec<Experiment>> {
        self.inner.repo.list_by_status(ExperimentStatus::Running).await
    }

    async fn require_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        self.inner
            .repo
            .get_experiment(experiment_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("experiment {experiment_id}")))
    }

    /// Run the analyzer and winner engine over the persisted aggregates,
    /// write the stamped results and snapshot back, and return the
    /// snapshot. O(variants) per experiment.
    async fn compute_analysis(&self, experiment: &Experiment) -> Result<AnalysisResult> {
        let config = experiment.config();
        let mut results = self.inner.repo.list_results(experiment.id()).await?;
        if results.is_empty() {
            return Err(Error::Computation(format!(
                "experiment {} has no results; has it been started?",
                experiment.id()
            )));
        }

        let control = config.control_variant().ok_or_else(|| {
            Error::Computation(format!(
                "experiment {} has no control variant",
                experiment.id()
            ))
        })?;
        let control_aggregate = results
            .iter()
            .find(|r| r.variant_id() == control.id())
            .and_then(|r| r.metric(config.primary_metric()).cloned())
            .unwrap_or_else(MetricAggregate::new);

        let analyzer = Analyzer::new(config.alpha());
        let empty = MetricAggregate::new();
        for result in &mut results {
            let aggregate = result.metric(config.primary_metric()).unwrap_or(&empty).clone();
            let comparison = analyzer.compare(&control_aggregate, &aggregate);
            result.apply_comparison(&comparison);
        }

        let (recommendation, winner) = recommend::pick_winner(
            &results,
            control.id(),
            config.primary_metric(),
            config.minimum_sample_size(),
        );
        for result in &mut results {
            result.set_winner(winner.as_deref() == Some(result.variant_id()));
        }

        for result in &results {
            self.inner.repo.stamp_result(result.clone()).await?;
        }

        let analysis = AnalysisResult::new(
            experiment.id(),
            self.now(),
            results,
            winner,
            recommendation,
        );
        self.inner.repo.put_analysis(analysis.clone()).await?;
        Ok(analysis)
    }
}
