//! Error types for roster generation.
//!
//! Only input defects are errors. Solver failures, report-generator gaps and
//! residual violations are ordinary values and never surface here.

use std::path::PathBuf;

/// Fatal roster generation errors.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid horizon: {reason}")]
    InvalidHorizon { reason: String },

    #[error("invalid continuity bounds: minDays={min_days}, maxDays={max_days}")]
    InvalidContinuity { min_days: u32, max_days: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading a [`Config`](crate::config::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for roster operations.
pub type Result<T> = std::result::Result<T, RosterError>;
