//! # scout
//!
//! Command-line front end for multi-source research queries.
//!
//! A free-text query is planned into a [`Query`] (tickers, profile and
//! notice hints), the configured sources are wired into a
//! [`SourceRegistry`], and the call is handed to
//! [`scout_aggregate::aggregate`]. The resulting payload is what the CLI
//! prints.
//!
//! ## Configuration
//!
//! [`ScoutConfig`] is read from TOML (default
//! `<config dir>/scout/config.toml`). Provider credentials are read from
//! the environment into [`Credentials`] and never written to disk.

pub mod config;
pub mod error;
pub mod plan;
pub mod registry;

use chrono::{DateTime, FixedOffset};
use scout_aggregate::normalize::timestamp::civil_now;
use scout_aggregate::AggregatePayload;

pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use plan::{plan_query, PlanOverrides};
pub use registry::{build_registry, Credentials};
pub use scout_aggregate::{Query, SourceKind};

/// Plan `text`, wire the enabled sources and run one aggregate call.
///
/// # Errors
///
/// Returns [`ScoutError::Config`] if the configuration is invalid or a
/// source cannot be set up, and [`ScoutError::Aggregate`] if the aggregate
/// call itself fails.
pub async fn search(
    text: &str,
    config: &ScoutConfig,
    credentials: &Credentials,
    overrides: &PlanOverrides,
) -> Result<AggregatePayload> {
    search_at(text, config, credentials, overrides, civil_now()).await
}

/// [`search`] with an explicit "now" for the procurement window and the
/// open-only filter.
///
/// # Errors
///
/// See [`search`].
pub async fn search_at(
    text: &str,
    config: &ScoutConfig,
    credentials: &Credentials,
    overrides: &PlanOverrides,
    now: DateTime<FixedOffset>,
) -> Result<AggregatePayload> {
    config.validate()?;
    let query = plan_query(text, config, overrides);
    let registry = build_registry(config, credentials, now)?;
    tracing::info!(sources = registry.len(), "running search");
    let aggregate = config.aggregate_at(now);
    let payload = scout_aggregate::aggregate_at(&query, &registry, &aggregate, now).await?;
    tracing::info!(
        records = payload.records().len(),
        errors = payload.errors().len(),
        elapsed_ms = payload.metadata().elapsed_ms,
        "search finished"
    );
    Ok(payload)
}
