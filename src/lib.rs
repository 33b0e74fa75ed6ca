//! # Splitlab: A/B & Multivariate Experimentation Engine
//!
//! Splitlab defines content variants, assigns visitors to variants with
//! deterministic sticky bucketing, aggregates conversion metrics with
//! streaming updates, computes statistical significance with a
//! two-proportion z-test, recommends a winner, and automatically manages
//! the experiment lifecycle (start, monitor, auto-stop).
//!
//! ## Design
//!
//! - **Sticky allocation**: a visitor's variant is a stable hash of
//!   `(experiment, visitor)` mapped onto cumulative traffic-split ranges,
//!   persisted on first assignment and never recomputed.
//! - **Streaming aggregation**: conversion events fold into per-variant,
//!   per-metric running means; memory is O(variants × metrics), not
//!   O(events).
//! - **Explicit lifecycle**: the engine owns its registry and clock; the
//!   monitor is a cancellable scheduled task, not an interval side-effect.
//!
//! ## Example
//!
//! ```rust,no_run
//! use splitlab::{Engine, MemoryRepository, Monitor, MonitorConfig};
//! use splitlab::experiment::{ExperimentConfig, Variant};
//!
//! # async fn example() -> splitlab::Result<()> {
//! let engine = Engine::new(MemoryRepository::new());
//!
//! let config = ExperimentConfig::builder("headline test", "conversion")
//!     .variant(Variant::new("control", "Current headline", true, 50.0))
//!     .variant(Variant::new("v1", "New headline", false, 50.0))
//!     .duration_days(7)
//!     .build();
//! let experiment = engine.create_experiment(config).await?;
//! engine.start_experiment(experiment.id()).await?;
//!
//! // Auto-stop on duration expiry or early significance.
//! let monitor = Monitor::spawn(engine.clone(), MonitorConfig::default());
//!
//! let variant = engine.assign_visitor(experiment.id(), "visitor-42").await?;
//! engine
//!     .record_conversion(experiment.id(), &variant, "visitor-42", "conversion", 1.0)
//!     .await?;
//!
//! monitor.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::cast_precision_loss)] // counts → f64 for statistics

pub mod allocate;
pub mod clock;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod recommend;
pub mod stats;
pub mod store;

pub use engine::{Engine, Monitor, MonitorConfig};
pub use error::{Error, Result};
pub use store::{ExperimentRepository, MemoryRepository};
