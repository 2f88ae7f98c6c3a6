//! Mapping raw provider records onto the canonical record shape.
//!
//! Normalisation is a pure function of its input batches: no I/O, no
//! clock reads. Applying it to already-canonical records (see
//! [`NormalizedRecord::to_raw`]) returns them unchanged.

pub mod dedup;
pub mod fields;
pub mod money;
pub mod timestamp;

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::types::{NormalizedRecord, RawRecord, SourceBatch, SourceCounts, SourceKind};

use fields::{first_present, resolve, table_for};

/// Title used when no title candidate is present.
pub const NO_TITLE: &str = "(no title)";

/// Inclusive date window applied to windowed sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

impl DateWindow {
    pub fn new(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Self {
        Self { from, to }
    }

    /// Records with no timestamp are admitted.
    pub fn admits(&self, at: Option<DateTime<FixedOffset>>) -> bool {
        at.is_none_or(|t| t >= self.from && t <= self.to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeFilters {
    pub window: Option<DateWindow>,
    /// Replaces [`SourceKind::trust`] for the listed sources.
    pub trust: BTreeMap<SourceKind, f64>,
}

/// Normaliser output with the bookkeeping the payload reports.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub skipped_by_window: usize,
    pub duplicates_removed: usize,
    pub per_source: BTreeMap<SourceKind, SourceCounts>,
}

/// Map, window-filter and de-duplicate every batch, in batch order.
pub fn normalize(batches: &[SourceBatch], filters: &NormalizeFilters) -> Vec<NormalizedRecord> {
    normalize_with_stats(batches, filters).records
}

pub fn normalize_with_stats(batches: &[SourceBatch], filters: &NormalizeFilters) -> Normalized {
    let mut per_source: BTreeMap<SourceKind, SourceCounts> = BTreeMap::new();
    let mut mapped = Vec::new();
    let mut skipped_by_window = 0;

    for batch in batches {
        per_source.entry(batch.source).or_default().raw += batch.records.len();
        for raw in &batch.records {
            let mut record = map_record(raw);
            if let Some(trust) = filters.trust.get(&record.source) {
                record.trust = *trust;
            }
            if let Some(window) = &filters.window {
                if record.source.is_windowed() && !window.admits(record.primary_timestamp()) {
                    tracing::debug!(
                        source = %record.source,
                        title = %record.title,
                        kind = %ErrorKind::NormalizationSkipped,
                        "record outside date window"
                    );
                    skipped_by_window += 1;
                    continue;
                }
            }
            mapped.push(record);
        }
    }

    let (records, duplicates_removed) = dedup::dedup(mapped);
    for record in &records {
        per_source.entry(record.source).or_default().normalized += 1;
    }

    Normalized {
        records,
        skipped_by_window,
        duplicates_removed,
        per_source,
    }
}

/// Map one raw record through its source's field table.
pub fn map_record(raw: &RawRecord) -> NormalizedRecord {
    let table = table_for(raw.source);
    let timestamp = |candidates: &[&str]| {
        candidates
            .iter()
            .filter_map(|key| raw.text(key))
            .find_map(|s| timestamp::parse_timestamp(&s))
    };

    let id = resolve(raw, table.id, table.derive_id);
    let mut extras: BTreeMap<String, String> = table
        .extras
        .iter()
        .filter_map(|(name, candidates)| {
            first_present(raw, candidates).map(|v| ((*name).to_owned(), v))
        })
        .collect();
    if let (Some(alias), Some(id)) = (table.id_alias, &id) {
        extras.insert(alias.to_owned(), id.clone());
    }

    // A canonical record carries its provider record under `raw`.
    let back_reference = match raw.fields.get("raw") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => raw.fields.clone(),
    };

    NormalizedRecord {
        source: raw.source,
        id,
        title: first_present(raw, table.title).unwrap_or_else(|| NO_TITLE.to_owned()),
        url: resolve(raw, table.url, table.derive_url).unwrap_or_default(),
        summary: resolve(raw, table.summary, table.derive_summary).unwrap_or_default(),
        classification: first_present(raw, table.classification),
        announced_at: timestamp(table.announced_at),
        closes_at: timestamp(table.closes_at),
        amount: first_present(raw, table.amount).and_then(|a| money::normalize_amount(&a)),
        trust: raw.source.trust(),
        extras,
        raw: back_reference,
    }
}
