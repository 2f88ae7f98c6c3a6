//! Web search through the Tavily search API.
//!
//! One client serves four sources: open web search plus three notice
//! searches that differ only in a query suffix and a domain restriction.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::http::{build_client, status_error};
use crate::types::{RawRecord, SourceKind};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Environment variable holding the Tavily key.
pub const TAVILY_KEY_VAR: &str = "TAVILY_API_KEY";

const API_USER_AGENT: &str = concat!("scout/", env!("CARGO_PKG_VERSION"));

/// Keywords appended to site-restricted notice searches.
const NOTICE_SUFFIX: &str = "공고 모집 지원";

/// Keywords appended to the unrestricted notice search.
const NOTICE_WEB_SUFFIX: &str = "모집 공고 지원 사업";

/// Connection settings for the search API.
#[derive(Debug, Clone)]
pub struct TavilyConfig {
    /// `None` makes every call fail with `CredentialMissing`.
    pub api_key: Option<String>,
    /// Base URL for the API (defaults to [`TAVILY_BASE_URL`]).
    pub base_url: String,
    /// `basic` or `advanced`.
    pub search_depth: String,
}

impl TavilyConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: TAVILY_BASE_URL.to_owned(),
            search_depth: "basic".to_owned(),
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
}

/// Thin client for `POST /search`.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    config: TavilyConfig,
    client: reqwest::Client,
}

impl TavilyClient {
    /// # Errors
    ///
    /// Returns [`AdapterError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: TavilyConfig) -> Result<Self, AdapterError> {
        let client = build_client(Duration::from_secs(60), Some(API_USER_AGENT))?;
        Ok(Self { config, client })
    }

    /// Search and return each hit as a raw record for `source`.
    pub async fn search(
        &self,
        source: SourceKind,
        query: &str,
        max_results: usize,
        include_domains: &[String],
        timeout: Duration,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::CredentialMissing(TAVILY_KEY_VAR.into()))?;

        tracing::trace!(%source, query, max_results, "tavily search");
        let body = SearchBody {
            api_key,
            query,
            max_results,
            search_depth: &self.config.search_depth,
            include_domains: (!include_domains.is_empty()).then_some(include_domains),
        };
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "tavily"));
        }

        let payload: Value = response.json().await?;
        let hits = payload
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::MalformedResponse("tavily: missing `results` array".into()))?;
        tracing::trace!(%source, hits = hits.len(), "tavily response");

        Ok(hits
            .iter()
            .filter_map(|hit| hit.as_object().cloned())
            .take(max_results)
            .map(|fields| RawRecord::new(source, fields))
            .collect())
    }
}

/// A search-backed source: web, or one of the notice searches.
#[derive(Debug, Clone)]
pub struct WebSearchAdapter {
    kind: SourceKind,
    client: TavilyClient,
    query_suffix: Option<&'static str>,
    include_domains: Vec<String>,
}

impl WebSearchAdapter {
    fn build(
        kind: SourceKind,
        config: TavilyConfig,
        query_suffix: Option<&'static str>,
        include_domains: &[&str],
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            kind,
            client: TavilyClient::new(config)?,
            query_suffix,
            include_domains: include_domains.iter().map(|d| (*d).to_owned()).collect(),
        })
    }

    /// Open web search with the query as given.
    pub fn web(config: TavilyConfig) -> Result<Self, AdapterError> {
        Self::build(SourceKind::WebSearch, config, None, &[])
    }

    /// Programme notices on nipa.kr.
    pub fn nipa(config: TavilyConfig) -> Result<Self, AdapterError> {
        Self::build(SourceKind::Nipa, config, Some(NOTICE_SUFFIX), &["nipa.kr"])
    }

    /// Programme notices on bizinfo.go.kr.
    pub fn bizinfo(config: TavilyConfig) -> Result<Self, AdapterError> {
        Self::build(SourceKind::Bizinfo, config, Some(NOTICE_SUFFIX), &["bizinfo.go.kr"])
    }

    /// Programme notices anywhere on the web.
    pub fn notice_web(config: TavilyConfig) -> Result<Self, AdapterError> {
        Self::build(SourceKind::NoticeWeb, config, Some(NOTICE_WEB_SUFFIX), &[])
    }

    /// The query text actually sent for `base`.
    pub fn search_query(&self, base: &str) -> String {
        let mut q = base.trim().to_owned();
        if let Some(suffix) = self.query_suffix {
            q.push(' ');
            q.push_str(suffix);
        }
        for domain in &self.include_domains {
            q.push_str(" site:");
            q.push_str(domain);
        }
        q.trim().to_owned()
    }
}

#[async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
        let query = self.search_query(&request.query);
        self.client
            .search(
                self.kind,
                &query,
                request.top_k,
                &self.include_domains,
                request.timeout,
            )
            .await
    }
}
