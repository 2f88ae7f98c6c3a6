//! Company / entity profiles: search for the top pages, then extract
//! readable text from each.
//!
//! A page that cannot be fetched or yields no text falls back to the
//! search hit's own snippet, so one bad page never sinks the source.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::http::build_client;
use crate::types::{RawRecord, SourceKind};

use super::web::{TavilyClient, TavilyConfig};

/// Pages looked at per query.
pub const DEFAULT_PROFILE_PAGES: usize = 2;

/// Characters of page text kept per record.
pub const DEFAULT_EXCERPT_CHARS: usize = 1_200;

/// Share of the request timeout the adapter spends before answering with
/// whatever it has; the rest is headroom under the orchestrator's timeout.
const BUDGET_SHARE: f64 = 0.8;

/// Elements removed before text extraction.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe",
];

/// Main-content selectors, most specific first.
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Text pulled out of one HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub title: String,
    pub text: String,
}

/// Extract the title and main text of `html`, keeping at most `max_chars`
/// bytes of text (cut back to a char boundary).
///
/// Returns `None` when the page has no readable text.
pub fn extract_page_text(html: &str, max_chars: usize) -> Option<PageText> {
    let cleaned = strip_boilerplate(html);
    let document = Html::parse_document(&cleaned);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| normalise_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let text = normalise_whitespace(&main_text(&document));
    if text.is_empty() {
        return None;
    }
    Some(PageText {
        title,
        text: truncate_at_boundary(&text, max_chars),
    })
}

fn main_text(document: &Html) -> String {
    for selector in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&sel).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            if !text.trim().is_empty() {
                return text;
            }
        }
    }
    String::new()
}

fn strip_boilerplate(html: &str) -> String {
    BOILERPLATE_TAGS
        .iter()
        .fold(html.to_owned(), |acc, tag| strip_tag(&acc, tag))
}

/// Remove every `<tag ...>...</tag>` span, matching the tag name exactly.
fn strip_tag(html: &str, tag: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find(&open) {
        let start = pos + offset;
        let after = start + open.len();
        let boundary = lower
            .as_bytes()
            .get(after)
            .is_none_or(|b| matches!(b, b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t'));
        if !boundary {
            out.push_str(&html[pos..after]);
            pos = after;
            continue;
        }
        out.push_str(&html[pos..start]);
        pos = match lower[start..].find(&close) {
            Some(end) => start + end + close.len(),
            None => lower[start..].find('>').map_or(html.len(), |gt| start + gt + 1),
        };
    }
    out.push_str(&html[pos..]);
    out
}

/// Collapse all whitespace runs to single spaces.
fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_owned();
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", text[..end].trim_end())
}

#[derive(Debug, Clone)]
pub struct ProfileAdapter {
    search: TavilyClient,
    pages: reqwest::Client,
    max_pages: usize,
    excerpt_chars: usize,
}

impl ProfileAdapter {
    /// # Errors
    ///
    /// Returns [`AdapterError::Transport`] if an HTTP client cannot be built.
    pub fn new(config: TavilyConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            search: TavilyClient::new(config)?,
            pages: build_client(Duration::from_secs(30), None)?,
            max_pages: DEFAULT_PROFILE_PAGES,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        })
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars.max(1);
        self
    }

    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<PageText, AdapterError> {
        let response = self.pages.get(url).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Transport(format!("page returned HTTP {status}")));
        }
        let html = response.text().await?;
        extract_page_text(&html, self.excerpt_chars)
            .ok_or_else(|| AdapterError::MalformedResponse("no extractable content".into()))
    }

    async fn enrich(&self, hit: RawRecord, timeout: Duration) -> RawRecord {
        let Some(url) = hit.text("url") else {
            return hit;
        };
        match self.fetch_page(&url, timeout).await {
            Ok(page) => {
                let mut fields = Map::new();
                let title = hit
                    .text("title")
                    .filter(|t| !t.is_empty())
                    .unwrap_or(page.title);
                fields.insert("title".into(), Value::String(title));
                fields.insert("url".into(), Value::String(url));
                fields.insert("content".into(), Value::String(page.text));
                if let Some(date) = hit.text("published_date") {
                    fields.insert("published_date".into(), Value::String(date));
                }
                RawRecord::new(SourceKind::Profile, fields)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "profile page fetch failed, keeping search snippet");
                hit
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for ProfileAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Profile
    }

    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
        let deadline = Instant::now() + request.timeout.mul_f64(BUDGET_SHARE);
        let limit = request.top_k.min(self.max_pages);
        let hits = self
            .search
            .search(SourceKind::Profile, &request.query, limit, &[], request.timeout)
            .await?;
        tracing::debug!(hits = hits.len(), "profile candidates");

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!("no time left for profile pages, keeping search snippets");
            return Ok(hits);
        }
        Ok(futures::future::join_all(hits.into_iter().map(|hit| self.enrich(hit, remaining))).await)
    }
}
