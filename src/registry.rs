//! Building the source registry from configuration and credentials.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use scout_aggregate::sources::web::TAVILY_KEY_VAR;
use scout_aggregate::sources::{
    PpsConfig, ProcurementAdapter, ProfileAdapter, QuoteAdapter, QuoteConfig, TavilyConfig,
    WebSearchAdapter,
};
use scout_aggregate::{AdapterError, SourceKind, SourceRegistry};

use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};

/// Fallback variable for the procurement service key.
pub const PPS_KEY_FALLBACK_VAR: &str = "PPS_API_KEY";

/// Provider credentials. Never serialised or logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub tavily_api_key: Option<String>,
    pub pps_service_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| "<set>"))
            .field("pps_service_key", &self.pps_service_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Self {
            tavily_api_key: get(TAVILY_KEY_VAR),
            pps_service_key: get(scout_aggregate::sources::procurement::PPS_KEY_VAR)
                .or_else(|| get(PPS_KEY_FALLBACK_VAR)),
        }
    }
}

type NoticeBuilder = fn(TavilyConfig) -> std::result::Result<WebSearchAdapter, AdapterError>;

fn wiring(kind: SourceKind) -> impl Fn(AdapterError) -> ScoutError {
    move |e| ScoutError::Config(format!("cannot set up {kind} source: {e}"))
}

/// Register every enabled source, in the fixed order web, quotes, profile,
/// procurement, nipa, bizinfo, notice web.
///
/// Missing credentials do not stop registration: the affected adapters
/// report `CredentialMissing` when invoked. `now` anchors the default
/// procurement window.
///
/// # Errors
///
/// Returns [`ScoutError::Config`] if an adapter's HTTP client cannot be built.
pub fn build_registry(
    config: &ScoutConfig,
    credentials: &Credentials,
    now: DateTime<FixedOffset>,
) -> Result<SourceRegistry> {
    let tavily = TavilyConfig {
        base_url: config.web.base_url.clone(),
        search_depth: config.web.search_depth.clone(),
        ..TavilyConfig::new(credentials.tavily_api_key.clone())
    };

    let mut registry = SourceRegistry::new();
    if config.web.enabled {
        let adapter = WebSearchAdapter::web(tavily.clone()).map_err(wiring(SourceKind::WebSearch))?;
        registry.register(Arc::new(adapter));
    }
    if config.quotes.enabled {
        let quotes = QuoteConfig {
            base_url: config.quotes.base_url.clone(),
            numeric_suffix: config.quotes.numeric_suffix.clone(),
        };
        let adapter = QuoteAdapter::new(quotes).map_err(wiring(SourceKind::Quotes))?;
        registry.register(Arc::new(adapter));
    }
    if config.profile.enabled {
        let adapter = ProfileAdapter::new(tavily.clone())
            .map_err(wiring(SourceKind::Profile))?
            .with_excerpt_chars(config.profile.excerpt_chars);
        registry.register(Arc::new(adapter));
    }
    if config.procurement.enabled {
        let p = &config.procurement;
        let pps = PpsConfig::new(credentials.pps_service_key.clone(), p.window(now))
            .with_base_url(p.base_url.clone())
            .with_paging(p.rows, p.page_max)
            .with_inqry_div(p.inqry_div.clone());
        let adapter = ProcurementAdapter::new(pps).map_err(wiring(SourceKind::Procurement))?;
        registry.register(Arc::new(adapter));
    }

    let notices = &config.notices;
    let notice_sources: [(bool, SourceKind, NoticeBuilder); 3] = [
        (notices.nipa, SourceKind::Nipa, WebSearchAdapter::nipa),
        (notices.bizinfo, SourceKind::Bizinfo, WebSearchAdapter::bizinfo),
        (notices.web, SourceKind::NoticeWeb, WebSearchAdapter::notice_web),
    ];
    for (enabled, kind, build) in notice_sources {
        if enabled {
            registry.register(Arc::new(build(tavily.clone()).map_err(wiring(kind))?));
        }
    }

    if credentials.tavily_api_key.is_none() {
        tracing::warn!("{TAVILY_KEY_VAR} not set; search-backed sources will report missing credentials");
    }
    tracing::debug!(sources = ?registry.kinds(), "source registry built");
    Ok(registry)
}
