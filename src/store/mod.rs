//! Repository collaborator for persisted experiment state
//!
//! The engine depends on this abstract trait; the concrete storage
//! technology is a deployment concern. [`MemoryRepository`] is the default
//! backend. In-memory state counts as persisted once a store call returns;
//! the engine never holds committed state outside the repository.
//!
//! # Example
//!
//! ```rust,no_run
//! use splitlab::store::{ExperimentRepository, MemoryRepository};
//! use splitlab::experiment::ExperimentStatus;
//!
//! # async fn example() -> splitlab::Result<()> {
//! let repo = MemoryRepository::new();
//! let running = repo.list_by_status(ExperimentStatus::Running).await?;
//! assert!(running.is_empty());
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryRepository;

use std::collections::HashMap;
use std::future::Future;

use crate::experiment::{
    AnalysisResult, Experiment, ExperimentStatus, VariantResult, VisitorAssignment,
};
use crate::Result;

/// Persistence operations the experimentation engine requires.
///
/// Aggregate updates (`apply_conversion`) and assignment creation
/// (`get_or_insert_assignment`) are invoked concurrently from many
/// request-serving call sites; implementations must make them atomic per
/// key so concurrent writers never lose updates.
pub trait ExperimentRepository: Send + Sync {
    /// Persist a new experiment.
    ///
    /// Fails with `InvalidState` if the id already exists.
    fn insert_experiment(&self, experiment: Experiment) -> impl Future<Output = Result<()>> + Send;

    /// Replace a persisted experiment.
    ///
    /// Fails with `NotFound` if the id is unknown.
    fn update_experiment(&self, experiment: Experiment) -> impl Future<Output = Result<()>> + Send;

    /// Fetch an experiment by id. `None` if unknown.
    fn get_experiment(&self, id: &str) -> impl Future<Output = Result<Option<Experiment>>> + Send;

    /// All experiments currently in the given status.
    fn list_by_status(
        &self,
        status: ExperimentStatus,
    ) -> impl Future<Output = Result<Vec<Experiment>>> + Send;

    /// Persist an assignment unless one already exists for the
    /// `(experiment, visitor)` pair; returns the canonical record either
    /// way. First write wins; assignments are never recomputed.
    fn get_or_insert_assignment(
        &self,
        assignment: VisitorAssignment,
    ) -> impl Future<Output = Result<VisitorAssignment>> + Send;

    /// Observed assignment counts per variant for an experiment.
    fn assignment_counts(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<HashMap<String, u64>>> + Send;

    /// Create zero-initialized result rows for the given variants,
    /// replacing any stale rows from a previous run.
    fn init_results(
        &self,
        experiment_id: &str,
        variant_ids: Vec<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically fold one conversion into a variant's aggregates and
    /// return the updated row.
    ///
    /// Fails with `NotFound` if no result row exists for the pair.
    fn apply_conversion(
        &self,
        experiment_id: &str,
        variant_id: &str,
        metric: &str,
        value: f64,
    ) -> impl Future<Output = Result<VariantResult>> + Send;

    /// Write back the statistical fields of an analyzed result row.
    ///
    /// Only the statistics are stamped onto the stored row; aggregates
    /// recorded concurrently since the analyzer's snapshot are preserved.
    fn stamp_result(&self, result: VariantResult) -> impl Future<Output = Result<()>> + Send;

    /// All result rows for an experiment, ordered by variant id.
    fn list_results(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Vec<VariantResult>>> + Send;

    /// Persist the latest analysis snapshot for an experiment.
    fn put_analysis(&self, analysis: AnalysisResult) -> impl Future<Output = Result<()>> + Send;

    /// Latest persisted analysis snapshot, if any.
    fn get_analysis(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Option<AnalysisResult>>> + Send;
}
