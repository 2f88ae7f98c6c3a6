//! Error types for the scout-aggregate crate.
//!
//! Adapter failures never escape the orchestrator: each one is converted
//! into an [`ErrorEntry`](crate::types::ErrorEntry) at the task boundary.
//! Only [`AggregateError`] can reach a caller of [`crate::aggregate`].
//! No credentials appear in any message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a single source adapter call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The adapter did not answer within its task budget.
    #[error("adapter timed out: {0}")]
    Timeout(String),

    /// Network or HTTP-level failure talking to the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// A credential the provider requires is not configured.
    #[error("credential missing: {0}")]
    CredentialMissing(String),

    /// The provider answered with a shape we cannot read.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The adapter task panicked; isolated like any other failure.
    #[error("adapter panicked: {0}")]
    Panicked(String),
}

impl AdapterError {
    /// The serialisable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::AdapterTimeout,
            Self::Transport(_) | Self::Panicked(_) => ErrorKind::AdapterTransportError,
            Self::CredentialMissing(_) => ErrorKind::AdapterCredentialMissing,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.without_url().to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.without_url().to_string())
        } else {
            // Provider URLs may carry keys in the query string.
            Self::Transport(err.without_url().to_string())
        }
    }
}

/// Error taxonomy carried by [`ErrorEntry`](crate::types::ErrorEntry).
///
/// `NormalizationSkipped` is only ever logged and counted in payload
/// metadata; it never appears in the payload's error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AdapterTimeout,
    AdapterTransportError,
    AdapterCredentialMissing,
    MalformedResponse,
    NormalizationSkipped,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AdapterTimeout => "adapter_timeout",
            Self::AdapterTransportError => "adapter_transport_error",
            Self::AdapterCredentialMissing => "adapter_credential_missing",
            Self::MalformedResponse => "malformed_response",
            Self::NormalizationSkipped => "normalization_skipped",
        })
    }
}

/// Pipeline-level failures. Partial source failure is never one of these.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Invalid aggregation configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The query enabled no source and the caller asked to fail.
    #[error("no source succeeded: {0}")]
    NothingSucceeded(String),
}

/// Convenience type alias for pipeline results.
pub type Result<T> = std::result::Result<T, AggregateError>;
