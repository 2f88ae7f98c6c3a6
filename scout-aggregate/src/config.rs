//! Aggregation configuration.
//!
//! [`AggregateConfig`] is passed explicitly into every [`crate::aggregate`]
//! call. Nothing here is global.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AggregateError;
use crate::normalize::DateWindow;
use crate::rank::RankWeights;
use crate::types::SourceKind;

/// Default number of simultaneously in-flight adapter calls.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default per-source task budget.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(20);

/// Default result budget applied after ranking.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Default per-source `top_k` when the query carries none.
pub const DEFAULT_TOP_K: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Worker pool width. Excess tasks queue.
    pub max_workers: usize,
    /// Budget for each source task, in seconds.
    pub per_source_timeout_secs: u64,
    /// Records returned after ranking.
    pub result_limit: usize,
    /// `top_k` handed to adapters the query has no override for.
    pub default_top_k: usize,
    /// Drop records whose deadline has passed.
    pub open_only: bool,
    /// Report a pipeline error when the query enables no registered
    /// source. Failing or empty sources never trigger it.
    pub fail_if_nothing_succeeded: bool,
    pub weights: RankWeights,
    /// Per-source trust overriding the built-in constants.
    pub trust: BTreeMap<SourceKind, f64>,
    /// Date window for windowed sources; not read from config files.
    #[serde(skip)]
    pub date_window: Option<DateWindow>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            per_source_timeout_secs: DEFAULT_SOURCE_TIMEOUT.as_secs(),
            result_limit: DEFAULT_RESULT_LIMIT,
            default_top_k: DEFAULT_TOP_K,
            open_only: false,
            fail_if_nothing_succeeded: false,
            weights: RankWeights::default(),
            trust: BTreeMap::new(),
            date_window: None,
        }
    }
}

impl AggregateConfig {
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_secs)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_source_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_date_window(mut self, window: DateWindow) -> Self {
        self.date_window = Some(window);
        self
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `max_workers` must be greater than 0
    /// - `per_source_timeout_secs` must be greater than 0
    /// - `result_limit` must be greater than 0
    /// - the date window, if any, must not be inverted
    /// - weights and trust overrides must be finite and non-negative
    pub fn validate(&self) -> Result<(), AggregateError> {
        if self.max_workers == 0 {
            return Err(AggregateError::Config(
                "max_workers must be greater than 0".into(),
            ));
        }
        if self.per_source_timeout_secs == 0 {
            return Err(AggregateError::Config(
                "per_source_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.result_limit == 0 {
            return Err(AggregateError::Config(
                "result_limit must be greater than 0".into(),
            ));
        }
        if let Some(window) = &self.date_window {
            if window.from > window.to {
                return Err(AggregateError::Config(
                    "date_window start must be <= end".into(),
                ));
            }
        }
        let w = &self.weights;
        if [w.relevance, w.recency, w.urgency, w.trust]
            .iter()
            .chain(self.trust.values())
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return Err(AggregateError::Config(
                "rank weights must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}
