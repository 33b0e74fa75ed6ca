//! Experiment data model, validation and multivariate generation
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Variant (N, exactly one control)
//!      │
//!      ├──< VisitorAssignment (N) [sticky, immutable]
//!      └──< VariantResult (N)     [streaming aggregates + statistics]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use splitlab::experiment::{validate, ExperimentConfig, Variant};
//!
//! let config = ExperimentConfig::builder("headline test", "conversion")
//!     .variant(Variant::new("control", "Current headline", true, 50.0))
//!     .variant(Variant::new("v1", "New headline", false, 50.0))
//!     .build();
//!
//! assert!(validate(&config).is_ok());
//! ```

mod definition;
pub mod multivariate;
mod results;
mod validate;

pub use definition::{
    Experiment, ExperimentConfig, ExperimentConfigBuilder, ExperimentStatus, StopReason, Variant,
};
pub use multivariate::{Factor, MultivariateSettings};
pub use results::{
    AnalysisResult, ConversionEvent, MetricAggregate, Recommendation, VariantResult,
    VisitorAssignment,
};
pub use validate::{validate, violations};
