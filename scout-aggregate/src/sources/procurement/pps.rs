//! Public procurement service (PPS) bid notice listings.
//!
//! Services-only listings: `getBidPblancListInfoServcPPSSrch` searches on
//! the notice title (`bidNtceNm`), `getBidPblancListInfoServc` lists the
//! whole date window.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as SignedDuration, FixedOffset, NaiveTime, TimeZone};
use serde_json::Value;

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::http::{build_client, status_error};
use crate::normalize::timestamp::{civil_offset, parse_timestamp, to_compact_minutes};
use crate::normalize::DateWindow;
use crate::types::{RawRecord, SourceKind};

use super::{dual_endpoint_fetch, Listing, ListingEndpoint};

pub const PPS_BASE_URL: &str = "https://apis.data.go.kr/1230000/ad/BidPublicInfoService";

/// Environment variable holding the service key.
pub const PPS_KEY_VAR: &str = "PPS_SERVICE_KEY";

const OP_SEARCH: &str = "getBidPblancListInfoServcPPSSrch";
const OP_GENERAL: &str = "getBidPblancListInfoServc";

pub const DEFAULT_ROWS: usize = 100;
pub const DEFAULT_PAGE_MAX: usize = 2;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Filter key that overrides [`PpsConfig::inqry_div`] per request.
pub const INQRY_DIV_FILTER: &str = "inqryDiv";

/// Request filter carrying the listing keyword. Takes precedence over the
/// query text; an empty value pages the general listing unfiltered.
pub const KEYWORD_FILTER: &str = "listingKeyword";

#[derive(Debug, Clone)]
pub struct PpsConfig {
    /// `None` makes every call fail with `CredentialMissing`.
    pub service_key: Option<String>,
    /// Base URL for the API (defaults to [`PPS_BASE_URL`]).
    pub base_url: String,
    /// `numOfRows` per page.
    pub rows: usize,
    /// Pages fetched per listing.
    pub page_max: usize,
    /// Inquiry division (`1` = by announcement date).
    pub inqry_div: String,
    /// Announcement window sent to the API and re-checked client-side.
    pub window: DateWindow,
}

impl PpsConfig {
    pub fn new(service_key: Option<String>, window: DateWindow) -> Self {
        Self {
            service_key: service_key.filter(|k| !k.trim().is_empty()),
            base_url: PPS_BASE_URL.to_owned(),
            rows: DEFAULT_ROWS,
            page_max: DEFAULT_PAGE_MAX,
            inqry_div: "1".to_owned(),
            window,
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_paging(mut self, rows: usize, page_max: usize) -> Self {
        self.rows = rows.max(1);
        self.page_max = page_max.max(1);
        self
    }

    pub fn with_inqry_div(mut self, inqry_div: impl Into<String>) -> Self {
        self.inqry_div = inqry_div.into();
        self
    }
}

/// Build the query window from optional `YYYYMMDDHHMM` / `YYYYMMDD` bounds.
///
/// A date-only `from` starts at 00:00 and a date-only `to` ends at 23:59.
/// A missing or unreadable bound falls back to `lookback_days` before
/// `now` (at 00:00) and to today at 23:59.
pub fn window_from(
    from: Option<&str>,
    to: Option<&str>,
    lookback_days: i64,
    now: DateTime<FixedOffset>,
) -> DateWindow {
    let now = now.with_timezone(&civil_offset());
    let from = from.and_then(|s| coerce_bound(s, false)).unwrap_or_else(|| {
        day_at(now - SignedDuration::days(lookback_days.max(0)), NaiveTime::MIN).unwrap_or(now)
    });
    let to = to
        .and_then(|s| coerce_bound(s, true))
        .unwrap_or_else(|| day_at(now, end_of_day()).unwrap_or(now));
    DateWindow::new(from, to)
}

fn coerce_bound(raw: &str, end: bool) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.len() {
        12 => parse_timestamp(s),
        8 => parse_timestamp(&format!("{s}{}", if end { "2359" } else { "0000" })),
        _ => None,
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

fn day_at(t: DateTime<FixedOffset>, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
    civil_offset()
        .from_local_datetime(&t.date_naive().and_time(time))
        .single()
}

/// Pull the item list out of a listing response.
///
/// `response.body.items` arrives as a list, as `{ "item": [...] }`, as
/// `{ "item": {...} }`, as a bare object, or not at all.
pub fn extract_items(payload: &Value) -> Result<Vec<Value>, AdapterError> {
    let body = payload
        .get("response")
        .ok_or_else(|| AdapterError::MalformedResponse("pps: missing `response`".into()))?
        .get("body");
    let Some(items) = body.and_then(|b| b.get("items")) else {
        return Ok(Vec::new());
    };
    Ok(match items {
        Value::Array(list) => list.clone(),
        Value::Object(obj) => match obj.get("item") {
            Some(Value::Array(list)) => list.clone(),
            Some(one @ Value::Object(_)) => vec![one.clone()],
            _ => vec![items.clone()],
        },
        // "" is what the service sends for an empty page.
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone)]
pub struct ProcurementAdapter {
    config: PpsConfig,
    client: reqwest::Client,
}

impl ProcurementAdapter {
    /// # Errors
    ///
    /// Returns [`AdapterError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: PpsConfig) -> Result<Self, AdapterError> {
        let client = build_client(Duration::from_secs(60), None)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &PpsConfig {
        &self.config
    }
}

/// One invocation's view of the API: credentials, budget and filters fixed.
struct PpsSession<'a> {
    config: &'a PpsConfig,
    client: &'a reqwest::Client,
    service_key: &'a str,
    inqry_div: &'a str,
    timeout: Duration,
}

impl PpsSession<'_> {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        key_param: &str,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(url)
            .query(params)
            .query(&[(key_param, self.service_key)])
            .timeout(self.timeout)
            .send()
            .await
    }
}

#[async_trait]
impl<'a> ListingEndpoint for PpsSession<'a> {
    async fn fetch_page(
        &self,
        listing: Listing,
        keyword: Option<&str>,
        page: usize,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let op = match listing {
            Listing::Search => OP_SEARCH,
            Listing::General => OP_GENERAL,
        };
        let url = format!("{}/{op}", self.config.base_url.trim_end_matches('/'));
        let mut params = vec![
            ("type", "json".to_owned()),
            ("inqryDiv", self.inqry_div.to_owned()),
            ("inqryBgnDt", to_compact_minutes(&self.config.window.from)),
            ("inqryEndDt", to_compact_minutes(&self.config.window.to)),
            ("pageNo", page.to_string()),
            ("numOfRows", self.config.rows.to_string()),
        ];
        if let (Listing::Search, Some(kw)) = (listing, keyword) {
            params.push(("bidNtceNm", kw.to_owned()));
        }

        let mut response = self.get(&url, &params, "serviceKey").await?;
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            tracing::debug!(op, "pps rejected serviceKey, retrying as ServiceKey");
            response = self.get(&url, &params, "ServiceKey").await?;
        }
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "pps"));
        }

        let payload: Value = response.json().await?;
        let items = extract_items(&payload)?;
        tracing::trace!(op, page, items = items.len(), "pps page");
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(RawRecord::new(SourceKind::Procurement, fields)),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for ProcurementAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Procurement
    }

    /// The listing size is governed by `rows` and `page_max`; `top_k` does
    /// not cut it, since ranking and the result limit happen downstream.
    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
        let service_key = self
            .config
            .service_key
            .as_deref()
            .ok_or_else(|| AdapterError::CredentialMissing(PPS_KEY_VAR.into()))?;
        let session = PpsSession {
            config: &self.config,
            client: &self.client,
            service_key,
            inqry_div: request
                .filter(INQRY_DIV_FILTER)
                .unwrap_or(&self.config.inqry_div),
            timeout: request.timeout,
        };
        let keyword = request.filter(KEYWORD_FILTER).unwrap_or(request.query.as_str());
        dual_endpoint_fetch(&session, Some(keyword), self.config.page_max, Some(&self.config.window)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> DateTime<FixedOffset> {
        parse_timestamp(s).expect("timestamp")
    }

    #[test]
    fn explicit_bounds_are_coerced() {
        let now = at("2024-06-15 12:00:00");
        let w = window_from(Some("20240601"), Some("20240610"), 30, now);
        assert_eq!(to_compact_minutes(&w.from), "202406010000");
        assert_eq!(to_compact_minutes(&w.to), "202406102359");

        let w = window_from(Some("202406011230"), None, 30, now);
        assert_eq!(to_compact_minutes(&w.from), "202406011230");
        assert_eq!(to_compact_minutes(&w.to), "202406152359");
    }

    #[test]
    fn missing_bounds_use_lookback() {
        let now = at("2024-06-15 12:00:00");
        let w = window_from(None, Some("June"), 30, now);
        assert_eq!(to_compact_minutes(&w.from), "202405160000");
        assert_eq!(to_compact_minutes(&w.to), "202406152359");
    }

    #[test]
    fn items_in_every_shape() {
        let list = json!({"response": {"body": {"items": [{"bidNtceNo": "1"}, {"bidNtceNo": "2"}]}}});
        assert_eq!(extract_items(&list).expect("list").len(), 2);

        let wrapped = json!({"response": {"body": {"items": {"item": [{"bidNtceNo": "1"}]}}}});
        assert_eq!(extract_items(&wrapped).expect("wrapped").len(), 1);

        let single = json!({"response": {"body": {"items": {"item": {"bidNtceNo": "9"}}}}});
        assert_eq!(extract_items(&single).expect("single")[0]["bidNtceNo"], "9");

        let bare = json!({"response": {"body": {"items": {"bidNtceNo": "7"}}}});
        assert_eq!(extract_items(&bare).expect("bare")[0]["bidNtceNo"], "7");

        let absent = json!({"response": {"body": {"totalCount": 0}}});
        assert!(extract_items(&absent).expect("absent").is_empty());

        let blank = json!({"response": {"body": {"items": ""}}});
        assert!(extract_items(&blank).expect("blank").is_empty());
    }

    #[test]
    fn missing_response_is_malformed() {
        let err = extract_items(&json!({"error": "bad"})).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_key_is_credential_error() {
        let now = at("2024-06-15 12:00:00");
        let adapter =
            ProcurementAdapter::new(PpsConfig::new(None, window_from(None, None, 30, now)))
                .expect("adapter");
        let err = adapter
            .invoke(&AdapterRequest::new("healthcare", 5, Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err, AdapterError::CredentialMissing(PPS_KEY_VAR.into()));
    }
}
