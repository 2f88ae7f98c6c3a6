//! Deciding which sources a query should reach.
//!
//! Everything here is a pure function of the [`Query`] (plus the registry's
//! order and the static config), so gating decisions are testable without
//! any adapter or network.

use std::time::Duration;

use crate::adapter::{AdapterRequest, SourceRegistry};
use crate::config::AggregateConfig;
use crate::types::{Query, SourceKind};

/// Whether a token reads like an instrument identifier.
///
/// Accepts 1-5 uppercase ASCII letters (`AAPL`) or a 6-digit code
/// (`005930`), optionally followed by an exchange suffix (`005930.KS`).
pub fn looks_like_ticker(token: &str) -> bool {
    let (base, suffix) = match token.split_once('.') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (token, None),
    };
    let suffix_ok = suffix.is_none_or(|s| {
        (1..=3).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_uppercase())
    });
    let letters = (1..=5).contains(&base.len()) && base.bytes().all(|b| b.is_ascii_uppercase());
    let digits = base.len() == 6 && base.bytes().all(|b| b.is_ascii_digit());
    suffix_ok && (letters || digits)
}

fn has_ticker_token(query: &Query) -> bool {
    query
        .text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | '?' | '!'))
        .any(looks_like_ticker)
}

/// Gate one source against a query.
pub fn is_enabled(kind: SourceKind, query: &Query) -> bool {
    let hints = &query.hints;
    match kind {
        SourceKind::WebSearch => true,
        SourceKind::Quotes => !hints.symbols.is_empty(),
        SourceKind::Profile => {
            hints.wants_profile || !hints.symbols.is_empty() || has_ticker_token(query)
        }
        SourceKind::Procurement | SourceKind::Nipa | SourceKind::Bizinfo | SourceKind::NoticeWeb => {
            hints.procurement
        }
    }
}

/// Registered sources the query enables, in registry order.
pub fn enabled_sources(query: &Query, registry: &SourceRegistry) -> Vec<SourceKind> {
    registry
        .kinds()
        .into_iter()
        .filter(|kind| is_enabled(*kind, query))
        .collect()
}

/// The task budget for one source: the per-source timeout, capped by the
/// query's overall budget when it has one.
pub fn task_timeout(query: &Query, config: &AggregateConfig) -> Duration {
    let per_source = config.per_source_timeout();
    query.budget().map_or(per_source, |b| b.min(per_source))
}

/// Build the adapter request for one enabled source.
pub fn request_for(kind: SourceKind, query: &Query, config: &AggregateConfig) -> AdapterRequest {
    let top_k = query
        .hints
        .top_k
        .get(&kind)
        .copied()
        .unwrap_or(config.default_top_k);
    let mut request = AdapterRequest::new(query.search_text(), top_k, task_timeout(query, config));
    request.symbols = query.hints.symbols.clone();
    request.filters = query.hints.filters.clone();
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_shapes() {
        assert!(looks_like_ticker("AAPL"));
        assert!(looks_like_ticker("T"));
        assert!(looks_like_ticker("005930"));
        assert!(looks_like_ticker("005930.KS"));
        assert!(!looks_like_ticker("Apple"));
        assert!(!looks_like_ticker("TOOLONG"));
        assert!(!looks_like_ticker("12345"));
        assert!(!looks_like_ticker(""));
        assert!(!looks_like_ticker("005930.kospi"));
    }

    #[test]
    fn web_always_enabled() {
        assert!(is_enabled(SourceKind::WebSearch, &Query::new("")));
    }

    #[test]
    fn quotes_need_symbols() {
        let q = Query::new("apple stock");
        assert!(!is_enabled(SourceKind::Quotes, &q));
        let q = q.with_symbols(["AAPL"]);
        assert!(is_enabled(SourceKind::Quotes, &q));
    }

    #[test]
    fn profile_on_ticker_token_or_flag() {
        assert!(!is_enabled(SourceKind::Profile, &Query::new("weather tomorrow")));
        assert!(is_enabled(SourceKind::Profile, &Query::new("what does NVDA make?")));
        assert!(is_enabled(
            SourceKind::Profile,
            &Query::new("삼성전자 기업").with_profile(true)
        ));
    }

    #[test]
    fn notice_sources_need_procurement_flag() {
        let plain = Query::new("healthcare");
        let notices = Query::new("healthcare").with_procurement(true);
        for kind in [
            SourceKind::Procurement,
            SourceKind::Nipa,
            SourceKind::Bizinfo,
            SourceKind::NoticeWeb,
        ] {
            assert!(!is_enabled(kind, &plain));
            assert!(is_enabled(kind, &notices));
        }
    }

    #[test]
    fn gating_is_deterministic() {
        let q = Query::new("AAPL 005930").with_symbols(["AAPL", "005930.KS"]);
        let first: Vec<_> = SourceKind::all().iter().map(|k| is_enabled(*k, &q)).collect();
        let second: Vec<_> = SourceKind::all().iter().map(|k| is_enabled(*k, &q)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn request_uses_hint_top_k_and_budget_cap() {
        let config = AggregateConfig::default();
        let q = Query::new("healthcare")
            .with_top_k(SourceKind::Procurement, 0)
            .with_budget(Duration::from_secs(5))
            .with_filter("inqryDiv", "2");
        let req = request_for(SourceKind::Procurement, &q, &config);
        assert_eq!(req.top_k, 1);
        assert_eq!(req.timeout, Duration::from_secs(5));
        assert_eq!(req.filter("inqryDiv"), Some("2"));

        let req = request_for(SourceKind::WebSearch, &q, &config);
        assert_eq!(req.top_k, config.default_top_k);
    }

    #[test]
    fn budget_larger_than_timeout_is_ignored() {
        let config = AggregateConfig::default();
        let q = Query::new("x").with_budget(Duration::from_secs(600));
        assert_eq!(task_timeout(&q, &config), config.per_source_timeout());
    }
}
