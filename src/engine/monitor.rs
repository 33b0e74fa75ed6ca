//! Periodic lifecycle monitor
//!
//! A single background task sweeps all Running experiments at a fixed
//! interval and auto-stops them on duration expiry or early significance.
//! Missed ticks are skipped, so a slow sweep never overlaps the next one.
//! The task is cancellable: [`Monitor::shutdown`] signals it and awaits
//! completion, so no sweep is cut off mid-experiment.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::Engine;
use crate::error::Result;
use crate::experiment::{Experiment, Recommendation, StopReason};
use crate::store::ExperimentRepository;

/// Monitor tuning.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Sweep interval. Production deployments typically use minutes; tests
    /// use milliseconds.
    pub interval: Duration,
    /// Confidence (`1 − p`) a winner must reach before an early stop.
    pub early_stop_confidence: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            early_stop_confidence: 0.95,
        }
    }
}

/// Handle to the running monitor task.
pub struct Monitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Monitor {
    /// Spawn the monitor task for an engine.
    #[must_use]
    pub fn spawn<R>(engine: Engine<R>, config: MonitorConfig) -> Self
    where
        R: ExperimentRepository + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.run_monitor_pass(config.early_stop_confidence).await;
                    }
                    changed = rx.changed() => {
                        // Stop on an explicit signal or a dropped sender.
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("monitor task exited");
        });
        Self { shutdown, handle }
    }

    /// Signal the task to stop and wait for the in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }

    /// Whether the task has already exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<R: ExperimentRepository> Engine<R> {
    /// One monitor sweep over all Running experiments. A failure on one
    /// experiment is logged and does not prevent the rest of the sweep.
    ///
    /// Returns the number of experiments auto-stopped. Exposed so tests
    /// (and embedders with their own schedulers) can drive sweeps directly.
    pub async fn run_monitor_pass(&self, early_stop_confidence: f64) -> usize {
        let running = match self.running_experiments().await {
            Ok(experiments) => experiments,
            Err(err) => {
                error!(%err, "monitor could not list running experiments");
                return 0;
            }
        };

        let mut stopped = 0;
        for experiment in running {
            match self.sweep_experiment(&experiment, early_stop_confidence).await {
                Ok(Some(reason)) => {
                    info!(experiment_id = experiment.id(), ?reason, "auto-stopped experiment");
                    stopped += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    error!(experiment_id = experiment.id(), %err, "monitor sweep failed for experiment");
                }
            }
        }
        stopped
    }

    /// Evaluate one Running experiment's auto-stop conditions.
    async fn sweep_experiment(
        &self,
        experiment: &Experiment,
        early_stop_confidence: f64,
    ) -> Result<Option<StopReason>> {
        let now = self.now();

        if experiment.is_expired(now) {
            self.stop_experiment(experiment.id(), Some(StopReason::DurationComplete))
                .await?;
            return Ok(Some(StopReason::DurationComplete));
        }

        let analysis = self.get_results(experiment.id()).await?;
        if analysis.recommendation() == Recommendation::AdoptWinner {
            // AdoptWinner already implies significance and the minimum
            // sample size; the confidence gate is on top of that.
            let confident = analysis
                .winner()
                .and_then(|id| analysis.result_for(id))
                .is_some_and(|winner| 1.0 - winner.p_value() >= early_stop_confidence);
            if confident {
                self.stop_experiment(
                    experiment.id(),
                    Some(StopReason::EarlyStoppingSignificance),
                )
                .await?;
                return Ok(Some(StopReason::EarlyStoppingSignificance));
            }
        }

        Ok(None)
    }
}
