//! Record de-duplication.
//!
//! Two records are duplicates when they share a canonical `id`, or, when
//! neither has one, the same trimmed title and canonical URL. The first
//! occurrence wins and the relative order of survivors is preserved.

use std::collections::HashSet;

use url::Url;

use crate::types::NormalizedRecord;

/// Query parameters that never distinguish two pages.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

#[derive(Debug, PartialEq, Eq, Hash)]
enum DedupKey {
    Id(String),
    TitleUrl(String, String),
}

fn key_of(record: &NormalizedRecord) -> DedupKey {
    match record.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => DedupKey::Id(id.to_owned()),
        None => DedupKey::TitleUrl(record.title.trim().to_owned(), canonical_url(&record.url)),
    }
}

/// Drop later duplicates; returns the survivors and the number removed.
pub fn dedup(records: Vec<NormalizedRecord>) -> (Vec<NormalizedRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert(key_of(record)))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Canonical URL form for comparison.
///
/// Host is lowercased, fragment and default port dropped, tracking
/// parameters stripped, remaining parameters sorted, trailing slash
/// removed. Unparsable input is only trimmed.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };

    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use serde_json::Map;
    use std::collections::BTreeMap;

    fn record(source: SourceKind, id: Option<&str>, title: &str, url: &str) -> NormalizedRecord {
        NormalizedRecord {
            source,
            id: id.map(str::to_owned),
            title: title.to_owned(),
            url: url.to_owned(),
            summary: String::new(),
            classification: None,
            announced_at: None,
            closes_at: None,
            amount: None,
            trust: source.trust(),
            extras: BTreeMap::new(),
            raw: Map::new(),
        }
    }

    #[test]
    fn same_id_keeps_first() {
        let a = record(SourceKind::Procurement, Some("123-0"), "Search hit", "https://a");
        let b = record(SourceKind::Procurement, Some("123-0"), "Listing hit", "https://b");
        let (kept, removed) = dedup(vec![a, b]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Search hit");
    }

    #[test]
    fn title_and_url_pair_when_no_id() {
        let a = record(SourceKind::WebSearch, None, "Rust", "https://example.com/a/");
        let b = record(SourceKind::NoticeWeb, None, " Rust ", "https://EXAMPLE.com/a#top");
        let c = record(SourceKind::WebSearch, None, "Rust", "https://example.com/b");
        let (kept, removed) = dedup(vec![a, b, c]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].url, "https://example.com/b");
    }

    #[test]
    fn same_url_different_title_survives() {
        let a = record(SourceKind::WebSearch, None, "One", "https://example.com");
        let b = record(SourceKind::WebSearch, None, "Two", "https://example.com");
        let (kept, removed) = dedup(vec![a, b]);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn order_is_preserved() {
        let records = vec![
            record(SourceKind::WebSearch, Some("3"), "c", ""),
            record(SourceKind::WebSearch, Some("1"), "a", ""),
            record(SourceKind::WebSearch, Some("3"), "c again", ""),
            record(SourceKind::WebSearch, Some("2"), "b", ""),
        ];
        let (kept, _) = dedup(records);
        let ids: Vec<_> = kept.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, ["3", "1", "2"]);
    }

    #[test]
    fn canonical_url_strips_noise() {
        assert_eq!(
            canonical_url("https://Example.COM:443/path/?utm_source=x&b=2&a=1#frag"),
            "https://example.com/path?a=1&b=2"
        );
        assert_eq!(canonical_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn canonical_url_passes_through_garbage() {
        assert_eq!(canonical_url("  not a url "), "not a url");
        assert_eq!(canonical_url(""), "");
    }
}
