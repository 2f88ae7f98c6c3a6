//! The aggregate pipeline: gate, fan out, normalise, filter, rank.

use std::time::Instant;

use chrono::{DateTime, FixedOffset};

use crate::adapter::SourceRegistry;
use crate::config::AggregateConfig;
use crate::error::{AggregateError, Result};
use crate::gating::{enabled_sources, request_for};
use crate::normalize::{normalize_with_stats, NormalizeFilters};
use crate::rank::{filter_open_only, rank_with, RankOptions};
use crate::types::{AggregatePayload, PayloadMetadata, Query};

use super::fanout::{fan_out, SourceTask};

/// Run one aggregate call with `now` as the reference time for
/// recency, urgency and open-only filtering.
///
/// # Pipeline
///
/// 1. Validate `config`
/// 2. Gate registered sources against the query
/// 3. Fan out to enabled sources, bounded by `config.max_workers`
/// 4. Normalise, window-filter and de-duplicate
/// 5. Drop closed records when `config.open_only` is set
/// 6. Rank, then truncate to `config.result_limit`
pub async fn run(
    query: &Query,
    sources: &SourceRegistry,
    config: &AggregateConfig,
    now: DateTime<FixedOffset>,
) -> Result<AggregatePayload> {
    config.validate()?;
    let started = Instant::now();

    let enabled = enabled_sources(query, sources);
    tracing::debug!(enabled = ?enabled, "sources enabled for query");

    let tasks: Vec<SourceTask> = enabled
        .iter()
        .filter_map(|kind| {
            sources.get(*kind).map(|adapter| SourceTask {
                source: *kind,
                adapter: adapter.clone(),
                request: request_for(*kind, query, config),
            })
        })
        .collect();

    if config.fail_if_nothing_succeeded && enabled.is_empty() {
        return Err(AggregateError::NothingSucceeded(
            "no registered source is enabled for this query".to_owned(),
        ));
    }

    let mut fanned = fan_out(tasks, config.max_workers).await;
    // Errors are reported in registry order; records keep arrival order.
    fanned
        .errors
        .sort_by_key(|e| enabled.iter().position(|k| *k == e.source));

    let filters = NormalizeFilters {
        window: config.date_window,
        trust: config.trust.clone(),
    };
    let normalized = normalize_with_stats(&fanned.batches, &filters);

    let mut per_source = normalized.per_source;
    for kind in &enabled {
        per_source.entry(*kind).or_default();
    }

    let (records, closed_removed) = if config.open_only {
        filter_open_only(normalized.records, now)
    } else {
        (normalized.records, 0)
    };

    let ranked = rank_with(
        records,
        query,
        &config.weights,
        &RankOptions {
            now,
            limit: Some(config.result_limit),
        },
    );

    let metadata = PayloadMetadata {
        enabled,
        per_source,
        skipped_by_window: normalized.skipped_by_window,
        duplicates_removed: normalized.duplicates_removed,
        closed_removed,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    tracing::info!(
        records = ranked.len(),
        errors = fanned.errors.len(),
        skipped_by_window = metadata.skipped_by_window,
        duplicates_removed = metadata.duplicates_removed,
        elapsed_ms = metadata.elapsed_ms,
        "aggregate complete"
    );

    Ok(AggregatePayload::new(
        query.clone(),
        ranked,
        fanned.errors,
        metadata,
    ))
}
