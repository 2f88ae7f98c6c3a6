//! Deterministic ranking of canonical records.
//!
//! `score = w_rel * relevance + w_rec * recency + w_urg * urgency + w_trust * trust`.
//! Sorting is stable: higher score first, then the later primary
//! timestamp, then arrival order. Truncation happens after ordering.

pub mod scoring;

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::normalize::timestamp::civil_now;
use crate::types::{NormalizedRecord, Query, RankedRecord};

/// Weight applied to each sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankWeights {
    pub relevance: f64,
    pub recency: f64,
    pub urgency: f64,
    pub trust: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            relevance: 1.0,
            recency: 0.5,
            urgency: 0.5,
            trust: 0.25,
        }
    }
}

/// Per-call ranking inputs that are not weights.
#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    /// Reference time for recency and urgency.
    pub now: DateTime<FixedOffset>,
    /// Truncate to this many records after ordering.
    pub limit: Option<usize>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            now: civil_now(),
            limit: None,
        }
    }
}

/// Rank against the current civil time without truncation.
pub fn rank(
    records: Vec<NormalizedRecord>,
    query: &Query,
    weights: &RankWeights,
) -> Vec<RankedRecord> {
    rank_with(records, query, weights, &RankOptions::default())
}

pub fn rank_with(
    records: Vec<NormalizedRecord>,
    query: &Query,
    weights: &RankWeights,
    options: &RankOptions,
) -> Vec<RankedRecord> {
    let tokens = scoring::query_tokens(&query.search_text());

    let mut scored: Vec<(usize, f64, NormalizedRecord)> = records
        .into_iter()
        .enumerate()
        .map(|(arrival, record)| {
            let score = weights.relevance * scoring::relevance(&record, &tokens)
                + weights.recency * scoring::recency(&record, options.now)
                + weights.urgency * scoring::urgency(&record, options.now)
                + weights.trust * record.trust;
            (arrival, score, record)
        })
        .collect();

    scored.sort_by(|(ia, sa, a), (ib, sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| compare_recency(b, a))
            .then_with(|| ia.cmp(ib))
    });

    if let Some(limit) = options.limit {
        scored.truncate(limit);
    }

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (_, score, record))| RankedRecord {
            record,
            score,
            rank: i + 1,
        })
        .collect()
}

/// Undated records sort as oldest.
fn compare_recency(a: &NormalizedRecord, b: &NormalizedRecord) -> Ordering {
    match (a.primary_timestamp(), b.primary_timestamp()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Drop records whose deadline is before `now`; undated records stay.
///
/// Returns the survivors and how many were removed.
pub fn filter_open_only(
    records: Vec<NormalizedRecord>,
    now: DateTime<FixedOffset>,
) -> (Vec<NormalizedRecord>, usize) {
    let before = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| r.closes_at.is_none_or(|close| close >= now))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
