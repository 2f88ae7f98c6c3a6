//! Independent sub-scores combined by the ranker.
//!
//! Each sub-score lies in `[0, 1]`:
//!
//! ```text
//! relevance = mean over query tokens of (1.0 title hit | 0.5 summary hit | 0)
//! recency   = 1 / (1 + age_days)             0 when no primary timestamp
//! urgency   = 1 / (1 + days_until_close)     0 when no deadline or closed
//! trust     = fixed per-source constant
//! ```

use chrono::{DateTime, FixedOffset};

use crate::types::NormalizedRecord;

const SECS_PER_DAY: f64 = 86_400.0;

/// Lowercased, de-duplicated whitespace tokens of the query text.
pub fn query_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in text.split_whitespace().map(str::to_lowercase) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

pub fn relevance(record: &NormalizedRecord, tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let title = record.title.to_lowercase();
    let summary = record.summary.to_lowercase();
    let total: f64 = tokens
        .iter()
        .map(|t| {
            if title.contains(t.as_str()) {
                1.0
            } else if summary.contains(t.as_str()) {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    total / tokens.len() as f64
}

pub fn recency(record: &NormalizedRecord, now: DateTime<FixedOffset>) -> f64 {
    record.primary_timestamp().map_or(0.0, |at| {
        let age_days = (days_between(at, now)).max(0.0);
        1.0 / (1.0 + age_days)
    })
}

pub fn urgency(record: &NormalizedRecord, now: DateTime<FixedOffset>) -> f64 {
    match record.closes_at {
        Some(close) if close >= now => 1.0 / (1.0 + days_between(now, close)),
        _ => 0.0,
    }
}

/// Signed days from `from` to `to`.
fn days_between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    (to - from).num_seconds() as f64 / SECS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::timestamp::parse_timestamp;
    use crate::types::{RawRecord, SourceKind};

    fn at(s: &str) -> DateTime<FixedOffset> {
        parse_timestamp(s).expect("timestamp")
    }

    fn record(title: &str, summary: &str) -> NormalizedRecord {
        crate::normalize::map_record(&RawRecord::from_pairs(
            SourceKind::WebSearch,
            [("title", title), ("content", summary)],
        ))
    }

    #[test]
    fn tokens_are_lowercased_and_unique() {
        assert_eq!(query_tokens("Rust rust  ASYNC"), ["rust", "async"]);
        assert!(query_tokens("   ").is_empty());
    }

    #[test]
    fn title_hit_outweighs_summary_hit() {
        let tokens = query_tokens("healthcare");
        let in_title = record("Healthcare IT tender", "");
        let in_summary = record("IT tender", "for healthcare providers");
        let neither = record("Road works", "asphalt");
        assert_eq!(relevance(&in_title, &tokens), 1.0);
        assert_eq!(relevance(&in_summary, &tokens), 0.5);
        assert_eq!(relevance(&neither, &tokens), 0.0);
    }

    #[test]
    fn relevance_averages_tokens() {
        let tokens = query_tokens("hospital cloud");
        let rec = record("Hospital network", "private cloud");
        assert_eq!(relevance(&rec, &tokens), 0.75);
    }

    #[test]
    fn recency_decays_with_age() {
        let now = at("2024-06-01");
        let mut rec = record("t", "");
        assert_eq!(recency(&rec, now), 0.0);
        rec.announced_at = Some(now);
        assert_eq!(recency(&rec, now), 1.0);
        rec.announced_at = Some(at("2024-05-31"));
        assert_eq!(recency(&rec, now), 0.5);
    }

    #[test]
    fn urgency_zero_when_closed_or_absent() {
        let now = at("2024-06-01");
        let mut rec = record("t", "");
        assert_eq!(urgency(&rec, now), 0.0);
        rec.closes_at = Some(at("2024-05-01"));
        assert_eq!(urgency(&rec, now), 0.0);
        rec.closes_at = Some(at("2024-06-02"));
        assert_eq!(urgency(&rec, now), 0.5);
    }

    #[test]
    fn nearer_deadline_is_more_urgent() {
        let now = at("2024-06-01");
        let mut soon = record("a", "");
        soon.closes_at = Some(at("2024-06-03"));
        let mut later = record("b", "");
        later.closes_at = Some(at("2024-07-01"));
        assert!(urgency(&soon, now) > urgency(&later, now));
    }
}
