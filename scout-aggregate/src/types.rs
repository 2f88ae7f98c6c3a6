//! Core types: sources, queries, raw and canonical records, the payload.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::ErrorKind;

/// Every independent provider the pipeline knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Full-text web search.
    WebSearch,
    /// Market quote lookup by instrument symbol.
    Quotes,
    /// Company/entity profile page extraction.
    Profile,
    /// Public procurement bid notices (dual-endpoint listing API).
    Procurement,
    /// Government programme notices on nipa.kr.
    Nipa,
    /// Government programme notices on bizinfo.go.kr.
    Bizinfo,
    /// Programme notices from the open web.
    NoticeWeb,
}

impl SourceKind {
    /// Stable short identifier used in logs and error entries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WebSearch => "web",
            Self::Quotes => "quotes",
            Self::Profile => "profile",
            Self::Procurement => "procurement",
            Self::Nipa => "nipa",
            Self::Bizinfo => "bizinfo",
            Self::NoticeWeb => "notice_web",
        }
    }

    /// Fixed per-source trust constant used by the ranker.
    pub fn trust(&self) -> f64 {
        match self {
            Self::Procurement => 1.0,
            Self::Quotes => 0.9,
            Self::Nipa | Self::Bizinfo => 0.8,
            Self::Profile => 0.7,
            Self::WebSearch => 0.6,
            Self::NoticeWeb => 0.4,
        }
    }

    /// Whether this source is queried over a date window, and so is subject
    /// to the normaliser's window filter.
    pub fn is_windowed(&self) -> bool {
        matches!(self, Self::Procurement)
    }

    /// Sources that answer procurement / programme-notice queries.
    pub fn is_notice_source(&self) -> bool {
        matches!(
            self,
            Self::Procurement | Self::Nipa | Self::Bizinfo | Self::NoticeWeb
        )
    }

    /// All variants, in default registry order.
    pub fn all() -> &'static [SourceKind] {
        &[
            Self::WebSearch,
            Self::Quotes,
            Self::Profile,
            Self::Procurement,
            Self::Nipa,
            Self::Bizinfo,
            Self::NoticeWeb,
        ]
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured hints attached to a query by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryHints {
    /// Instrument identifiers recognised in the query text.
    pub symbols: Vec<String>,
    /// Keywords for search-style sources; the raw text is used when empty.
    pub keywords: Vec<String>,
    /// The query reads like a company or entity reference.
    pub wants_profile: bool,
    /// The query asks for procurement / programme notices.
    pub procurement: bool,
    /// Per-source result-count limits.
    pub top_k: BTreeMap<SourceKind, usize>,
    /// Extra provider filters forwarded verbatim to adapters.
    pub filters: BTreeMap<String, String>,
}

/// One request unit. Never mutated once handed to [`crate::aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The caller's raw text.
    pub text: String,
    /// Planner output.
    #[serde(default)]
    pub hints: QueryHints,
    /// Overall budget in milliseconds; caps every per-source timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_ms: Option<u64>,
}

impl Query {
    /// A query with no hints.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hints: QueryHints::default(),
            budget_ms: None,
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_profile(mut self, wants_profile: bool) -> Self {
        self.hints.wants_profile = wants_profile;
        self
    }

    pub fn with_procurement(mut self, procurement: bool) -> Self {
        self.hints.procurement = procurement;
        self
    }

    pub fn with_top_k(mut self, source: SourceKind, top_k: usize) -> Self {
        self.hints.top_k.insert(source, top_k);
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.filters.insert(key.into(), value.into());
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget_ms = Some(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The overall budget, if the caller set one.
    pub fn budget(&self) -> Option<Duration> {
        self.budget_ms.map(Duration::from_millis)
    }

    /// Text used by search-style sources: joined keywords, or the raw text.
    pub fn search_text(&self) -> String {
        if self.hints.keywords.is_empty() {
            self.text.trim().to_owned()
        } else {
            self.hints.keywords.join(" ")
        }
    }
}

/// A provider-native record: an opaque key/value mapping plus its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceKind,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(source: SourceKind, fields: Map<String, Value>) -> Self {
        Self { source, fields }
    }

    /// Build a record from string pairs; convenient for adapters and tests.
    pub fn from_pairs<'a, I>(source: SourceKind, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), Value::String(v.to_owned())))
            .collect();
        Self { source, fields }
    }

    /// Read a field as trimmed text. Numbers and booleans are rendered;
    /// null, arrays, objects and blank strings read as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_owned())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// All raw records one source produced, tagged with arrival position.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub source: SourceKind,
    pub records: Vec<RawRecord>,
}

/// The canonical record shape every source is mapped into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: SourceKind,
    /// Canonical identifier (e.g. bid number `123-0`), when the source has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Never empty; `"(no title)"` when no candidate was present.
    pub title: String,
    pub url: String,
    pub summary: String,
    /// Source-specific classification: agency, symbol, notice kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announced_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<DateTime<FixedOffset>>,
    /// Display form, e.g. `12,345,000원`, or the provider's text verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub trust: f64,
    /// Source-specific extras (contract method, price, currency, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
    /// The provider record this was built from, for audit.
    pub raw: Map<String, Value>,
}

/// Display format for timestamps in the civil timezone.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

impl NormalizedRecord {
    /// The timestamp recency is measured from.
    pub fn primary_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.announced_at
    }

    pub fn display_announced(&self) -> Option<String> {
        self.announced_at
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
    }

    pub fn display_closes(&self) -> Option<String> {
        self.closes_at.map(|t| t.format(DISPLAY_FORMAT).to_string())
    }

    /// Render back to a raw record keyed by canonical field names.
    ///
    /// Normalising the result yields this record again.
    pub fn to_raw(&self) -> RawRecord {
        let mut fields = Map::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                fields.insert(key.to_owned(), Value::String(v));
            }
        };
        put("id", self.id.clone());
        put("title", Some(self.title.clone()));
        put("url", Some(self.url.clone()));
        put("summary", Some(self.summary.clone()));
        put("classification", self.classification.clone());
        put(
            "announced_at",
            self.announced_at
                .map(|t| t.format(crate::normalize::timestamp::CANONICAL_FORMAT).to_string()),
        );
        put(
            "closes_at",
            self.closes_at
                .map(|t| t.format(crate::normalize::timestamp::CANONICAL_FORMAT).to_string()),
        );
        put("amount", self.amount.clone());
        for (k, v) in &self.extras {
            fields.insert(k.clone(), Value::String(v.clone()));
        }
        fields.insert("raw".to_owned(), Value::Object(self.raw.clone()));
        RawRecord::new(self.source, fields)
    }
}

/// A canonical record with its computed score and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    #[serde(flatten)]
    pub record: NormalizedRecord,
    pub score: f64,
    pub rank: usize,
}

/// One failed source task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub source: SourceKind,
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-source counts reported in payload metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    /// Raw records the adapter returned.
    pub raw: usize,
    /// Canonical records that survived filtering and de-duplication.
    pub normalized: usize,
}

/// Bookkeeping attached to every payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// Sources the gate enabled for this query, in registry order.
    pub enabled: Vec<SourceKind>,
    pub per_source: BTreeMap<SourceKind, SourceCounts>,
    /// Records dropped by the date-window filter.
    pub skipped_by_window: usize,
    pub duplicates_removed: usize,
    /// Records dropped by open-only mode.
    pub closed_removed: usize,
    pub elapsed_ms: u64,
}

/// The sole value handed back to callers. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatePayload {
    query: Query,
    records: Vec<RankedRecord>,
    errors: Vec<ErrorEntry>,
    metadata: PayloadMetadata,
}

impl AggregatePayload {
    pub(crate) fn new(
        query: Query,
        records: Vec<RankedRecord>,
        errors: Vec<ErrorEntry>,
        metadata: PayloadMetadata,
    ) -> Self {
        Self {
            query,
            records,
            errors,
            metadata,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn records(&self) -> &[RankedRecord] {
        &self.records
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn metadata(&self) -> &PayloadMetadata {
        &self.metadata
    }

    /// The payload as a plain JSON mapping, for renderers and persistence.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
