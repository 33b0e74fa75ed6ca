//! Error types for splitlab
//!
//! Validation and state errors surface synchronously to the caller;
//! recording against an inactive experiment is logged and swallowed at the
//! call site instead of being raised through this taxonomy.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Splitlab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment configuration rejected by the validator.
    ///
    /// Carries **every** violation found, not just the first, so a caller
    /// can fix the whole configuration in one round trip.
    #[error("invalid experiment config: {}", violations.join("; "))]
    Validation {
        /// All violations detected in the configuration
        violations: Vec<String>,
    },

    /// Unknown experiment or variant id
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid for the experiment's current status
    /// (e.g. starting a Running experiment, assigning to a Stopped one)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Statistics requested with insufficient data
    #[error("computation error: {0}")]
    Computation(String),

    /// Serialization error on a persisted record payload
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a validation error from a list of violations.
    #[must_use]
    pub const fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }

    /// Violations carried by a `Validation` error, empty for other variants.
    #[must_use]
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Validation { violations } => violations,
            _ => &[],
        }
    }
}
