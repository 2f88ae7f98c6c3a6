//! Error types for the scout CLI crate.

use scout_aggregate::AggregateError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Configuration or source wiring error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The aggregate call itself failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScoutError>;
