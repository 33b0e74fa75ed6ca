//! In-memory repository implementation using `DashMap`.
//!
//! The default backend - state is lost on process restart. DashMap's
//! entry-level locking makes `apply_conversion` and
//! `get_or_insert_assignment` atomic per key without a global lock, so the
//! assignment/recording hot path never contends with the analyzer.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::ExperimentRepository;
use crate::experiment::{
    AnalysisResult, Experiment, ExperimentStatus, VariantResult, VisitorAssignment,
};
use crate::{Error, Result};

/// In-memory experiment repository.
///
/// Thread-safe and optimized for high-concurrency assignment and
/// conversion-recording workloads.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    experiments: DashMap<String, Experiment>,
    assignments: DashMap<(String, String), VisitorAssignment>,
    results: DashMap<(String, String), VariantResult>,
    analyses: DashMap<String, AnalysisResult>,
}

impl MemoryRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of stored visitor assignments.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// True when nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.assignments.is_empty() && self.results.is_empty()
    }
}

impl ExperimentRepository for MemoryRepository {
    async fn insert_experiment(&self, experiment: Experiment) -> Result<()> {
        let id = experiment.id().to_string();
        match self.experiments.entry(id.clone()) {
            Entry::Occupied(_) => Err(Error::InvalidState(format!(
                "experiment {id} already exists"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(experiment);
                Ok(())
            }
        }
    }

    async fn update_experiment(&self, experiment: Experiment) -> Result<()> {
        let id = experiment.id().to_string();
        match self.experiments.entry(id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(experiment);
                Ok(())
            }
            Entry::Vacant(_) => Err(Error::NotFound(format!("experiment {id}"))),
        }
    }

    async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.get(id).map(|e| e.value().clone()))
    }

    async fn list_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>> {
        let mut experiments: Vec<Experiment> = self
            .experiments
            .iter()
            .filter(|entry| entry.value().status() == status)
            .map(|entry| entry.value().clone())
            .collect();
        experiments.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(experiments)
    }

    async fn get_or_insert_assignment(
        &self,
        assignment: VisitorAssignment,
    ) -> Result<VisitorAssignment> {
        let key = (
            assignment.experiment_id().to_string(),
            assignment.visitor_id().to_string(),
        );
        let entry = self.assignments.entry(key).or_insert(assignment);
        Ok(entry.value().clone())
    }

    async fn assignment_counts(&self, experiment_id: &str) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for entry in &self.assignments {
            if entry.key().0 == experiment_id {
                *counts.entry(entry.value().variant_id().to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn init_results(&self, experiment_id: &str, variant_ids: Vec<String>) -> Result<()> {
        for variant_id in variant_ids {
            self.results.insert(
                (experiment_id.to_string(), variant_id.clone()),
                VariantResult::new(experiment_id, variant_id),
            );
        }
        Ok(())
    }

    async fn apply_conversion(
        &self,
        experiment_id: &str,
        variant_id: &str,
        metric: &str,
        value: f64,
    ) -> Result<VariantResult> {
        let key = (experiment_id.to_string(), variant_id.to_string());
        let mut entry = self.results.get_mut(&key).ok_or_else(|| {
            Error::NotFound(format!(
                "variant {variant_id} in experiment {experiment_id}"
            ))
        })?;
        entry.record(metric, value);
        Ok(entry.value().clone())
    }

    async fn stamp_result(&self, result: VariantResult) -> Result<()> {
        let key = (
            result.experiment_id().to_string(),
            result.variant_id().to_string(),
        );
        match self.results.entry(key) {
            Entry::Occupied(mut slot) => slot.get_mut().copy_statistics_from(&result),
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
        }
        Ok(())
    }

    async fn list_results(&self, experiment_id: &str) -> Result<Vec<VariantResult>> {
        let mut results: Vec<VariantResult> = self
            .results
            .iter()
            .filter(|entry| entry.key().0 == experiment_id)
            .map(|entry| entry.value().clone())
            .collect();
        results.sort_by(|a, b| a.variant_id().cmp(b.variant_id()));
        Ok(results)
    }

    async fn put_analysis(&self, analysis: AnalysisResult) -> Result<()> {
        self.analyses
            .insert(analysis.experiment_id().to_string(), analysis);
        Ok(())
    }

    async fn get_analysis(&self, experiment_id: &str) -> Result<Option<AnalysisResult>> {
        Ok(self.analyses.get(experiment_id).map(|a| a.value().clone()))
    }
}
