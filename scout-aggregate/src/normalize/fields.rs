//! Candidate-key tables mapping provider field names onto canonical fields.
//!
//! For every canonical field each source lists the provider keys that may
//! carry it, in priority order; the first non-empty one wins. The canonical
//! name itself always comes first so already-canonical records map onto
//! themselves.

use crate::types::{RawRecord, SourceKind};

/// Computes a field from the whole record when no candidate key matched.
pub type Derive = fn(&RawRecord) -> Option<String>;

/// Candidate keys for each canonical field of one source family.
#[derive(Debug)]
pub struct FieldTable {
    pub id: &'static [&'static str],
    pub title: &'static [&'static str],
    pub url: &'static [&'static str],
    pub summary: &'static [&'static str],
    pub classification: &'static [&'static str],
    pub announced_at: &'static [&'static str],
    pub closes_at: &'static [&'static str],
    pub amount: &'static [&'static str],
    /// `(canonical extra name, candidates)`.
    pub extras: &'static [(&'static str, &'static [&'static str])],
    /// Extra name the resolved id is also published under.
    pub id_alias: Option<&'static str>,
    pub derive_id: Option<Derive>,
    pub derive_url: Option<Derive>,
    pub derive_summary: Option<Derive>,
}

const WEB: FieldTable = FieldTable {
    id: &["id"],
    title: &["title", "name", "headline"],
    url: &["url", "link", "href"],
    summary: &["summary", "content", "snippet", "description", "raw_content"],
    classification: &["classification", "category"],
    announced_at: &["announced_at", "published_date", "published_at", "date"],
    closes_at: &["closes_at"],
    amount: &["amount"],
    extras: &[],
    id_alias: None,
    derive_id: None,
    derive_url: None,
    derive_summary: None,
};

const QUOTES: FieldTable = FieldTable {
    id: &["id", "symbol"],
    title: &["title", "shortName", "longName", "symbol"],
    url: &["url", "link"],
    summary: &["summary"],
    classification: &["classification", "symbol"],
    announced_at: &["announced_at", "regularMarketTime", "as_of"],
    closes_at: &["closes_at"],
    amount: &["amount"],
    extras: &[
        ("price", &["price", "regularMarketPrice", "last_price"]),
        ("currency", &["currency"]),
        ("error", &["error"]),
    ],
    id_alias: None,
    derive_id: None,
    derive_url: Some(quote_url),
    derive_summary: Some(quote_summary),
};

const PROCUREMENT: FieldTable = FieldTable {
    id: &["id"],
    title: &["title", "bidNtceNm", "bidNm", "ntceNm"],
    url: &["url", "bidNtceUrl", "bidNtceDtlUrl"],
    summary: &["summary"],
    classification: &["classification", "dminsttNm", "ntceInsttNm", "orgNm"],
    announced_at: &["announced_at", "bidNtceDt", "ntceDt", "bidBeginDt"],
    closes_at: &["closes_at", "bidClseDt", "opengDt", "bidEndDt"],
    amount: &["amount", "presmptPrce", "asignBdgtAmt", "totPrdprc"],
    extras: &[
        ("notice_kind", &["notice_kind", "ntceKindNm"]),
        ("contract_method", &["contract_method", "cntrctCnclsMthdNm"]),
        ("award_method", &["award_method", "sucsfbidMthdNm"]),
        ("agency", &["agency", "dminsttNm", "ntceInsttNm", "orgNm"]),
    ],
    id_alias: Some("bid_no"),
    derive_id: Some(bid_number),
    derive_url: Some(bid_detail_link),
    derive_summary: None,
};

const NOTICES: FieldTable = FieldTable {
    id: &["id", "pblancId"],
    title: &["title", "pblancNm", "name"],
    url: &["url", "pblancUrl", "link"],
    summary: &["summary", "content", "snippet", "bsnsSumryCn", "description"],
    classification: &["classification", "jrsdInsttNm", "excInsttNm"],
    announced_at: &["announced_at", "published_date", "creatPnttm", "date"],
    closes_at: &["closes_at", "reqstEndDe", "deadline", "end_date"],
    amount: &["amount"],
    extras: &[],
    id_alias: None,
    derive_id: None,
    derive_url: None,
    derive_summary: None,
};

/// The table for a source.
pub fn table_for(source: SourceKind) -> &'static FieldTable {
    match source {
        SourceKind::WebSearch | SourceKind::Profile => &WEB,
        SourceKind::Quotes => &QUOTES,
        SourceKind::Procurement => &PROCUREMENT,
        SourceKind::Nipa | SourceKind::Bizinfo | SourceKind::NoticeWeb => &NOTICES,
    }
}

/// First non-empty value among `candidates`, in order.
pub fn first_present(record: &RawRecord, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|key| record.text(key))
}

/// Candidates first, then the derivation if there is one.
pub fn resolve(record: &RawRecord, candidates: &[&str], derive: Option<Derive>) -> Option<String> {
    first_present(record, candidates).or_else(|| derive.and_then(|f| f(record)))
}

/// `{bidNtceNo}-{bidNtceOrd}`; the order defaults to `0`.
fn bid_number(record: &RawRecord) -> Option<String> {
    let number = first_present(record, &["bidNtceNo", "bidno"])?;
    let order = first_present(record, &["bidNtceOrd", "bidseq"]).unwrap_or_else(|| "0".into());
    Some(format!("{number}-{order}"))
}

/// Public deep link for a single bid notice.
fn bid_detail_link(record: &RawRecord) -> Option<String> {
    let number = first_present(record, &["bidNtceNo", "bidno"])?;
    let order = first_present(record, &["bidNtceOrd", "bidseq"]).unwrap_or_else(|| "0".into());
    Some(format!(
        "https://www.g2b.go.kr/link/PNPE027_01/single/?bidPbancNo={number}&bidPbancOrd={order}"
    ))
}

fn quote_url(record: &RawRecord) -> Option<String> {
    let symbol = first_present(record, &["symbol"])?;
    Some(format!("https://finance.yahoo.com/quote/{symbol}"))
}

fn quote_summary(record: &RawRecord) -> Option<String> {
    if let Some(err) = record.text("error") {
        return Some(format!("quote unavailable: {err}"));
    }
    let price = first_present(record, &["price", "regularMarketPrice", "last_price"])?;
    match record.text("currency") {
        Some(currency) => Some(format!("{price} {currency}")),
        None => Some(price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_wins() {
        let rec = RawRecord::from_pairs(
            SourceKind::Procurement,
            [("bidNm", "second"), ("bidNtceNm", "first")],
        );
        assert_eq!(
            first_present(&rec, table_for(SourceKind::Procurement).title).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn blank_candidate_is_skipped() {
        let rec = RawRecord::from_pairs(
            SourceKind::Procurement,
            [("bidNtceNm", "  "), ("ntceNm", "fallback title")],
        );
        assert_eq!(
            first_present(&rec, table_for(SourceKind::Procurement).title).as_deref(),
            Some("fallback title")
        );
    }

    #[test]
    fn canonical_name_leads_every_table() {
        for kind in SourceKind::all() {
            let t = table_for(*kind);
            assert_eq!(t.id[0], "id");
            assert_eq!(t.title[0], "title");
            assert_eq!(t.url[0], "url");
            assert_eq!(t.summary[0], "summary");
            assert_eq!(t.classification[0], "classification");
            assert_eq!(t.announced_at[0], "announced_at");
            assert_eq!(t.closes_at[0], "closes_at");
            assert_eq!(t.amount[0], "amount");
            for (name, candidates) in t.extras {
                assert_eq!(candidates[0], *name);
            }
        }
    }

    #[test]
    fn bid_number_defaults_order_to_zero() {
        let rec = RawRecord::from_pairs(SourceKind::Procurement, [("bidNtceNo", "123")]);
        assert_eq!(bid_number(&rec).as_deref(), Some("123-0"));
        let rec = RawRecord::from_pairs(
            SourceKind::Procurement,
            [("bidNtceNo", "123"), ("bidNtceOrd", "01")],
        );
        assert_eq!(bid_number(&rec).as_deref(), Some("123-01"));
    }

    #[test]
    fn detail_link_requires_number() {
        let rec = RawRecord::from_pairs(SourceKind::Procurement, [("bidNtceOrd", "1")]);
        assert!(bid_detail_link(&rec).is_none());
        let rec = RawRecord::from_pairs(SourceKind::Procurement, [("bidNtceNo", "R24BK0001")]);
        assert_eq!(
            bid_detail_link(&rec).as_deref(),
            Some("https://www.g2b.go.kr/link/PNPE027_01/single/?bidPbancNo=R24BK0001&bidPbancOrd=0")
        );
    }

    #[test]
    fn quote_summary_reports_error() {
        let rec = RawRecord::from_pairs(
            SourceKind::Quotes,
            [("symbol", "ZZZZ"), ("error", "not found")],
        );
        assert_eq!(quote_summary(&rec).as_deref(), Some("quote unavailable: not found"));
    }

    #[test]
    fn quote_summary_joins_price_and_currency() {
        let rec = RawRecord::from_pairs(
            SourceKind::Quotes,
            [("symbol", "AAPL"), ("price", "189.5"), ("currency", "USD")],
        );
        assert_eq!(quote_summary(&rec).as_deref(), Some("189.5 USD"));
    }
}
