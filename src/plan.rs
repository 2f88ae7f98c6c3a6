//! Turning free text into a [`Query`] with source hints.
//!
//! Planning is pure: the same text and config always produce the same
//! query. Which sources actually run is decided later by the gate in
//! `scout_aggregate::gating`.

use std::time::Duration;

use scout_aggregate::gating::looks_like_ticker;
use scout_aggregate::sources::procurement::pps::KEYWORD_FILTER;
use scout_aggregate::sources::quotes::normalize_symbol;
use scout_aggregate::{Query, SourceKind};

use crate::config::ScoutConfig;

/// Words marking a company or entity lookup.
const PROFILE_MARKERS: &[&str] = &["기업", "회사", "profile", "company"];

/// Words marking a procurement or programme-notice lookup.
const NOTICE_MARKERS: &[&str] = &[
    "공고", "입찰", "조달", "나라장터", "모집", "지원사업", "procurement", "tender",
];

/// Caller overrides on top of what the text implies.
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    /// Extra instrument symbols.
    pub symbols: Vec<String>,
    pub force_profile: bool,
    pub force_notices: bool,
    /// Overall budget for the aggregate call.
    pub budget: Option<Duration>,
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '?' | '!' | ';' | ':' | '"' | '\'')
    })
    .map(|t| t.trim_end_matches('.'))
    .filter(|t| !t.is_empty())
}

/// Instrument identifiers in `text`, first occurrence first.
///
/// Bare 6-digit codes get `numeric_suffix` (`005930` → `005930.KS`).
pub fn extract_tickers(text: &str, numeric_suffix: &str) -> Vec<String> {
    collect_tickers(text, numeric_suffix, true)
}

/// Only codes count: 6-digit numbers and suffixed symbols. Bare letter
/// tokens (`AI`, `EMR`) are left as words.
fn extract_codes(text: &str, numeric_suffix: &str) -> Vec<String> {
    collect_tickers(text, numeric_suffix, false)
}

fn collect_tickers(text: &str, numeric_suffix: &str, letters: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = tokens(text)
        .filter(|t| looks_like_ticker(t))
        .filter(|t| letters || t.contains('.') || t.bytes().any(|b| b.is_ascii_digit()));
    for token in candidates {
        let symbol = normalize_symbol(token, numeric_suffix);
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

fn mentions(text: &str, markers: &[&str]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

/// Whether the text reads like a company or entity reference.
pub fn wants_profile(text: &str, tickers: &[String]) -> bool {
    !tickers.is_empty() || mentions(text, PROFILE_MARKERS)
}

/// Whether the text asks for procurement or programme notices.
pub fn wants_notices(text: &str) -> bool {
    mentions(text, NOTICE_MARKERS)
}

/// Text left once notice markers and instrument codes are removed; this
/// is what the listing and notice searches match titles against.
fn notice_keywords(text: &str, numeric_suffix: &str, symbols: &[String]) -> Vec<String> {
    tokens(text)
        .filter(|t| !mentions(t, NOTICE_MARKERS))
        .filter(|t| !symbols.contains(&normalize_symbol(t, numeric_suffix)))
        .map(str::to_owned)
        .collect()
}

/// Plan `text` into a query.
pub fn plan_query(text: &str, config: &ScoutConfig, overrides: &PlanOverrides) -> Query {
    let text = text.trim();
    let suffix = &config.quotes.numeric_suffix;

    let notices = overrides.force_notices || wants_notices(text);

    // In a notice query, letter tokens are topics ("AI 입찰"), not instruments.
    let mut symbols = if notices {
        extract_codes(text, suffix)
    } else {
        extract_tickers(text, suffix)
    };
    for extra in &overrides.symbols {
        let symbol = normalize_symbol(extra, suffix);
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    let profile = overrides.force_profile || wants_profile(text, &symbols);

    let mut query = Query::new(text)
        .with_profile(profile)
        .with_procurement(notices)
        .with_top_k(SourceKind::WebSearch, config.web.top_k)
        .with_top_k(SourceKind::Nipa, config.notices.nipa_top_k)
        .with_top_k(SourceKind::Bizinfo, config.notices.bizinfo_top_k)
        .with_top_k(SourceKind::NoticeWeb, config.notices.web_top_k);
    if notices {
        let keywords = notice_keywords(text, suffix, &symbols);
        // An empty listing keyword pages the general listing unfiltered.
        query = query.with_filter(KEYWORD_FILTER, keywords.join(" "));
        if !keywords.is_empty() {
            query = query.with_keywords(keywords);
        }
    }
    if !symbols.is_empty() {
        query = query.with_symbols(symbols);
    }
    if let Some(budget) = overrides.budget {
        query = query.with_budget(budget);
    }
    tracing::debug!(
        symbols = query.hints.symbols.len(),
        profile,
        notices,
        "query planned"
    );
    query
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn plan(text: &str) -> Query {
        plan_query(text, &ScoutConfig::default(), &PlanOverrides::default())
    }

    #[test]
    fn tickers_are_extracted_in_order_without_duplicates() {
        let tickers = extract_tickers("AAPL vs MSFT, then AAPL again (005930)", ".KS");
        assert_eq!(tickers, vec!["AAPL", "MSFT", "005930.KS"]);
    }

    #[test]
    fn suffixed_codes_are_kept() {
        assert_eq!(extract_tickers("005930.KS 주가", ".KS"), vec!["005930.KS"]);
        assert!(extract_tickers("삼성전자 주가 전망", ".KS").is_empty());
    }

    #[test]
    fn lowercase_words_are_not_tickers() {
        assert!(extract_tickers("rust async runtime", ".KS").is_empty());
    }

    #[test]
    fn ticker_enables_profile_and_symbols() {
        let q = plan("NVDA earnings");
        assert_eq!(q.hints.symbols, vec!["NVDA"]);
        assert!(q.hints.wants_profile);
        assert!(!q.hints.procurement);
    }

    #[test]
    fn company_marker_enables_profile() {
        assert!(plan("카카오 회사 개요").hints.wants_profile);
        assert!(plan("Acme company overview").hints.wants_profile);
        assert!(!plan("weather in seoul").hints.wants_profile);
    }

    #[test]
    fn notice_marker_enables_procurement_with_keywords() {
        let q = plan("헬스케어 입찰 공고");
        assert!(q.hints.procurement);
        assert_eq!(q.hints.keywords, vec!["헬스케어"]);
        assert_eq!(q.search_text(), "헬스케어");
        assert_eq!(q.hints.filters.get(KEYWORD_FILTER).map(String::as_str), Some("헬스케어"));
    }

    #[test]
    fn bare_notice_query_lists_without_keyword() {
        let q = plan("입찰공고");
        assert!(q.hints.procurement);
        assert!(q.hints.keywords.is_empty());
        assert_eq!(q.search_text(), "입찰공고");
        assert_eq!(q.hints.filters.get(KEYWORD_FILTER).map(String::as_str), Some(""));
    }

    #[test]
    fn acronym_in_notice_query_is_a_keyword() {
        let q = plan("AI 입찰 공고");
        assert!(q.hints.procurement);
        assert!(q.hints.symbols.is_empty());
        assert!(!q.hints.wants_profile);
        assert_eq!(q.hints.keywords, vec!["AI"]);
        assert_eq!(q.search_text(), "AI");
        assert_eq!(q.hints.filters.get(KEYWORD_FILTER).map(String::as_str), Some("AI"));
    }

    #[test]
    fn numeric_codes_stay_symbols_in_notice_queries() {
        let q = plan("005930 EMR 입찰");
        assert_eq!(q.hints.symbols, vec!["005930.KS"]);
        assert_eq!(q.hints.keywords, vec!["EMR"]);
    }

    #[test]
    fn overrides_add_symbols_and_flags() {
        let overrides = PlanOverrides {
            symbols: vec!["000660".into(), "NVDA".into()],
            force_notices: true,
            budget: Some(Duration::from_secs(8)),
            ..Default::default()
        };
        let q = plan_query("NVDA supply chain", &ScoutConfig::default(), &overrides);
        assert_eq!(q.hints.symbols, vec!["000660.KS", "NVDA"]);
        assert_eq!(q.hints.keywords, vec!["supply", "chain"]);
        assert!(q.hints.procurement);
        assert_eq!(q.budget(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn per_source_top_k_comes_from_config() {
        let q = plan("anything");
        assert_eq!(q.hints.top_k.get(&SourceKind::Nipa), Some(&3));
        assert_eq!(q.hints.top_k.get(&SourceKind::Bizinfo), Some(&2));
        assert_eq!(q.hints.top_k.get(&SourceKind::WebSearch), Some(&6));
    }
}
