//! # scout-aggregate
//!
//! Concurrent multi-source aggregation for Scout.
//!
//! One query fans out to every registered source the query enables. Each
//! source returns records in its own shape; the results are mapped onto a
//! single canonical record, window-filtered, de-duplicated, ranked and
//! returned in one [`AggregatePayload`] together with a per-source error
//! list.
//!
//! ## Design
//!
//! - Sources sit behind the [`SourceAdapter`] trait and are collected in a
//!   [`SourceRegistry`]; adapters own their configuration
//! - A bounded worker pool runs enabled sources concurrently, each under
//!   its own timeout
//! - Partial failure is the normal case: a failing, stalled or panicking
//!   source becomes one [`ErrorEntry`] and never fails the call
//! - Normalisation and ranking are pure functions of their inputs
//!
//! ## Security
//!
//! - Credentials are passed to adapters at construction and never logged
//! - Query text is logged only at trace level

pub mod adapter;
pub mod config;
pub mod error;
pub mod gating;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod rank;
pub mod sources;
pub mod testing;
pub mod types;

use chrono::{DateTime, FixedOffset};

pub use adapter::{AdapterRequest, SourceAdapter, SourceRegistry};
pub use config::AggregateConfig;
pub use error::{AdapterError, AggregateError, ErrorKind, Result};
pub use normalize::DateWindow;
pub use rank::RankWeights;
pub use types::{
    AggregatePayload, ErrorEntry, NormalizedRecord, PayloadMetadata, Query, QueryHints,
    RankedRecord, RawRecord, SourceKind,
};

/// Run `query` against the enabled sources in `sources`.
///
/// Source failures are reported in [`AggregatePayload::errors`]; an empty
/// record list with errors is a normal result.
///
/// # Errors
///
/// Returns [`AggregateError::Config`] if `config` is invalid, and
/// [`AggregateError::NothingSucceeded`] only when
/// `config.fail_if_nothing_succeeded` is set and the query enables no
/// registered source.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> scout_aggregate::Result<()> {
/// use std::sync::Arc;
/// use scout_aggregate::sources::{TavilyConfig, WebSearchAdapter};
/// use scout_aggregate::{AggregateConfig, Query, SourceRegistry};
///
/// let web = WebSearchAdapter::web(TavilyConfig::new(std::env::var("TAVILY_API_KEY").ok()))
///     .map_err(|e| scout_aggregate::AggregateError::Config(e.to_string()))?;
/// let registry = SourceRegistry::new().with(Arc::new(web));
/// let payload = scout_aggregate::aggregate(
///     &Query::new("rust async runtimes"),
///     &registry,
///     &AggregateConfig::default(),
/// )
/// .await?;
/// for ranked in payload.records() {
///     println!("{}. {}", ranked.rank, ranked.record.title);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn aggregate(
    query: &Query,
    sources: &SourceRegistry,
    config: &AggregateConfig,
) -> Result<AggregatePayload> {
    aggregate_at(query, sources, config, normalize::timestamp::civil_now()).await
}

/// [`aggregate`] with an explicit reference time for recency, urgency and
/// open-only filtering.
///
/// # Errors
///
/// Same as [`aggregate`].
pub async fn aggregate_at(
    query: &Query,
    sources: &SourceRegistry,
    config: &AggregateConfig,
    now: DateTime<FixedOffset>,
) -> Result<AggregatePayload> {
    orchestrator::pipeline::run(query, sources, config, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAdapter;
    use std::sync::Arc;

    #[tokio::test]
    async fn aggregate_validates_config_zero_workers() {
        let config = AggregateConfig {
            max_workers: 0,
            ..Default::default()
        };
        let result = aggregate(&Query::new("test"), &SourceRegistry::new(), &config).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_workers"));
    }

    #[tokio::test]
    async fn aggregate_validates_config_zero_limit() {
        let config = AggregateConfig {
            result_limit: 0,
            ..Default::default()
        };
        let result = aggregate(&Query::new("test"), &SourceRegistry::new(), &config).await;
        assert!(result.unwrap_err().to_string().contains("result_limit"));
    }

    #[tokio::test]
    async fn empty_registry_is_an_empty_payload() {
        let payload = aggregate(&Query::new("test"), &SourceRegistry::new(), &AggregateConfig::default())
            .await
            .expect("payload");
        assert!(payload.records().is_empty());
        assert!(payload.errors().is_empty());
        assert!(payload.metadata().enabled.is_empty());
    }

    #[tokio::test]
    async fn web_records_are_ranked() {
        let registry =
            SourceRegistry::new().with(Arc::new(FakeAdapter::records(SourceKind::WebSearch, 3)));
        let payload = aggregate(&Query::new("record"), &registry, &AggregateConfig::default())
            .await
            .expect("payload");
        let ranks: Vec<usize> = payload.records().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(payload.query().text, "record");
    }
}
