//! Error types for JetLimits

use thiserror::Error;

/// JetLimits error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or empty replica source, malformed model name, inconsistent workspace.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid argument (shape mismatch, out-of-range probability, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Likelihood identically zero over a range, or a posterior with zero integral.
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
