//! Market quotes from the Yahoo Finance chart endpoint.
//!
//! Each symbol is looked up independently. A symbol that cannot be quoted
//! yields a record carrying an `error` field; the source as a whole fails
//! only when every lookup failed at the transport level.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Map, Value};

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::http::build_client;
use crate::normalize::timestamp::{civil_offset, CANONICAL_FORMAT};
use crate::types::{RawRecord, SourceKind};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Clone)]
pub struct QuoteConfig {
    /// Base URL for the API (defaults to [`YAHOO_BASE_URL`]).
    pub base_url: String,
    /// Suffix for bare 6-digit codes.
    pub numeric_suffix: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_BASE_URL.to_owned(),
            numeric_suffix: ".KS".to_owned(),
        }
    }
}

impl QuoteConfig {
    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Append `suffix` to a bare 6-digit exchange code.
pub fn normalize_symbol(symbol: &str, suffix: &str) -> String {
    let s = symbol.trim();
    if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
        format!("{s}{suffix}")
    } else {
        s.to_owned()
    }
}

#[derive(Debug, Clone)]
pub struct QuoteAdapter {
    config: QuoteConfig,
    client: reqwest::Client,
}

/// Outcome of one symbol lookup.
enum Lookup {
    Quote(RawRecord),
    /// Provider answered but had no usable quote.
    Unavailable(RawRecord),
    Transport(AdapterError),
}

impl QuoteAdapter {
    /// # Errors
    ///
    /// Returns [`AdapterError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: QuoteConfig) -> Result<Self, AdapterError> {
        let client = build_client(Duration::from_secs(60), None)?;
        Ok(Self { config, client })
    }

    async fn lookup(&self, symbol: &str, timeout: Duration) -> Lookup {
        let url = format!(
            "{}/v8/finance/chart/{symbol}",
            self.config.base_url.trim_end_matches('/')
        );
        let response = match self
            .client
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1d")])
            .timeout(timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Lookup::Transport(e.into()),
        };

        let status = response.status();
        if status.is_server_error() {
            return Lookup::Transport(AdapterError::Transport(format!(
                "quotes returned HTTP {status}"
            )));
        }
        let payload: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return Lookup::Unavailable(error_record(symbol, &e.without_url().to_string())),
        };
        parse_chart(symbol, &payload)
    }
}

fn error_record(symbol: &str, message: &str) -> RawRecord {
    RawRecord::from_pairs(SourceKind::Quotes, [("symbol", symbol), ("error", message)])
}

fn parse_chart(symbol: &str, payload: &Value) -> Lookup {
    let chart = payload.get("chart");
    if let Some(desc) = chart
        .and_then(|c| c.get("error"))
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
    {
        return Lookup::Unavailable(error_record(symbol, desc));
    }

    let meta = chart
        .and_then(|c| c.get("result"))
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .and_then(|r| r.get("meta"));
    let price = meta.and_then(|m| m.get("regularMarketPrice")).and_then(Value::as_f64);
    let currency = meta.and_then(|m| m.get("currency")).and_then(Value::as_str);

    let (Some(price), Some(currency)) = (price, currency) else {
        return Lookup::Unavailable(error_record(symbol, "price/currency missing"));
    };

    let mut fields = Map::new();
    fields.insert("symbol".into(), Value::String(symbol.to_owned()));
    fields.insert("price".into(), Value::from(price));
    fields.insert("currency".into(), Value::String(currency.to_owned()));
    if let Some(as_of) = meta
        .and_then(|m| m.get("regularMarketTime"))
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    {
        let civil = as_of.with_timezone(&civil_offset());
        fields.insert("as_of".into(), Value::String(civil.format(CANONICAL_FORMAT).to_string()));
    }
    Lookup::Quote(RawRecord::new(SourceKind::Quotes, fields))
}

#[async_trait]
impl SourceAdapter for QuoteAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Quotes
    }

    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
        let mut symbols: Vec<String> = Vec::new();
        for raw in &request.symbols {
            let symbol = normalize_symbol(raw, &self.config.numeric_suffix);
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let lookups =
            futures::future::join_all(symbols.iter().map(|s| self.lookup(s, request.timeout)))
                .await;

        let mut records = Vec::with_capacity(lookups.len());
        let mut transport_failures = 0;
        let mut last_transport = None;
        for (symbol, lookup) in symbols.iter().zip(lookups) {
            match lookup {
                Lookup::Quote(record) => records.push(record),
                Lookup::Unavailable(record) => {
                    tracing::debug!(%symbol, "quote unavailable");
                    records.push(record);
                }
                Lookup::Transport(err) => {
                    tracing::debug!(%symbol, error = %err, "quote lookup failed");
                    records.push(error_record(symbol, &err.to_string()));
                    transport_failures += 1;
                    last_transport = Some(err);
                }
            }
        }

        match last_transport {
            Some(err) if transport_failures == symbols.len() => Err(err),
            _ => Ok(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn six_digit_codes_get_exchange_suffix() {
        assert_eq!(normalize_symbol("005930", ".KS"), "005930.KS");
        assert_eq!(normalize_symbol(" AAPL ", ".KS"), "AAPL");
        assert_eq!(normalize_symbol("005930.KS", ".KS"), "005930.KS");
    }

    #[test]
    fn parses_chart_meta() {
        let payload = json!({
            "chart": {
                "result": [{"meta": {
                    "symbol": "AAPL",
                    "currency": "USD",
                    "regularMarketPrice": 189.5,
                    "regularMarketTime": 1717200000
                }}],
                "error": null
            }
        });
        let Lookup::Quote(record) = parse_chart("AAPL", &payload) else {
            panic!("expected quote");
        };
        assert_eq!(record.text("price").as_deref(), Some("189.5"));
        assert_eq!(record.text("currency").as_deref(), Some("USD"));
        // 2024-06-01T00:00:00Z
        assert_eq!(record.text("as_of").as_deref(), Some("2024-06-01 09:00:00"));
    }

    #[test]
    fn chart_error_becomes_error_record() {
        let payload = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}
        });
        let Lookup::Unavailable(record) = parse_chart("ZZZZ", &payload) else {
            panic!("expected unavailable");
        };
        assert_eq!(record.text("symbol").as_deref(), Some("ZZZZ"));
        assert!(record.text("error").is_some_and(|e| e.contains("delisted")));
    }

    #[test]
    fn missing_price_is_unavailable() {
        let payload = json!({"chart": {"result": [{"meta": {"currency": "KRW"}}]}});
        assert!(matches!(parse_chart("005930.KS", &payload), Lookup::Unavailable(_)));
    }

    #[tokio::test]
    async fn no_symbols_no_records() {
        let adapter = QuoteAdapter::new(QuoteConfig::default()).expect("adapter");
        let records = adapter
            .invoke(&AdapterRequest::new("apple", 3, Duration::from_secs(1)))
            .await
            .expect("ok");
        assert!(records.is_empty());
    }
}
