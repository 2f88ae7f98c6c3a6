//! Configuration for the scout CLI and the sources it wires up.
//!
//! Everything except credentials lives in a TOML file. Credentials come
//! from the environment only (see [`crate::registry::Credentials`]).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use scout_aggregate::sources::procurement::pps::{
    window_from, DEFAULT_LOOKBACK_DAYS, DEFAULT_PAGE_MAX, DEFAULT_ROWS, PPS_BASE_URL,
};
use scout_aggregate::sources::quotes::YAHOO_BASE_URL;
use scout_aggregate::sources::web::TAVILY_BASE_URL;
use scout_aggregate::{AggregateConfig, DateWindow};

use crate::error::{Result, ScoutError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Worker pool, timeouts, ranking.
    pub aggregate: AggregateConfig,
    /// Open web search.
    pub web: WebConfig,
    /// Market quotes.
    pub quotes: QuotesConfig,
    /// Company profile extraction.
    pub profile: ProfileConfig,
    /// Public procurement listings.
    pub procurement: ProcurementConfig,
    /// Government programme notice searches.
    pub notices: NoticesConfig,
}

/// Web search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    /// Search API base URL.
    pub base_url: String,
    /// `basic` or `advanced`.
    pub search_depth: String,
    /// Results requested per query.
    pub top_k: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: TAVILY_BASE_URL.to_owned(),
            search_depth: "basic".to_owned(),
            top_k: 6,
        }
    }
}

/// Quote lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Exchange suffix for bare 6-digit codes.
    pub numeric_suffix: String,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: YAHOO_BASE_URL.to_owned(),
            numeric_suffix: ".KS".to_owned(),
        }
    }
}

/// Profile extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub enabled: bool,
    /// Characters of page text kept per profile page.
    pub excerpt_chars: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            excerpt_chars: scout_aggregate::sources::profile::DEFAULT_EXCERPT_CHARS,
        }
    }
}

/// Procurement listing settings.
///
/// `PPS_ROWS`, `PPS_PAGE_MAX`, `PPS_DATE_FROM`, `PPS_DATE_TO`,
/// `PPS_LOOKBACK_DAYS` and `PPS_INQRY_DIV` override the file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcurementConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Rows per page.
    pub rows: usize,
    /// Pages per listing.
    pub page_max: usize,
    pub inqry_div: String,
    /// Window length when no explicit bounds are set.
    pub lookback_days: i64,
    /// `YYYYMMDD` or `YYYYMMDDHHMM`.
    pub date_from: Option<String>,
    /// `YYYYMMDD` or `YYYYMMDDHHMM`.
    pub date_to: Option<String>,
}

impl ProcurementConfig {
    /// The listing window: explicit bounds when set, otherwise the last
    /// `lookback_days` days ending today.
    pub fn window(&self, now: DateTime<FixedOffset>) -> DateWindow {
        window_from(
            self.date_from.as_deref(),
            self.date_to.as_deref(),
            self.lookback_days,
            now,
        )
    }
}

impl Default for ProcurementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: PPS_BASE_URL.to_owned(),
            rows: DEFAULT_ROWS,
            page_max: DEFAULT_PAGE_MAX,
            inqry_div: "1".to_owned(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            date_from: None,
            date_to: None,
        }
    }
}

/// Notice search settings, one switch and `top_k` per site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticesConfig {
    pub nipa: bool,
    pub nipa_top_k: usize,
    pub bizinfo: bool,
    pub bizinfo_top_k: usize,
    /// Unrestricted web search for notices.
    pub web: bool,
    pub web_top_k: usize,
}

impl Default for NoticesConfig {
    fn default() -> Self {
        Self {
            nipa: true,
            nipa_top_k: 3,
            bizinfo: true,
            bizinfo_top_k: 2,
            web: true,
            web_top_k: 2,
        }
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScoutError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/scout/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("scout"))
            .unwrap_or_else(|| PathBuf::from("/tmp/scout-config"))
            .join("config.toml")
    }

    /// Apply `PPS_*` overrides read through `lookup`. Unparsable numbers
    /// are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let number = |key: &str| {
            get(key).and_then(|v| match v.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!(key, value = %v, "ignoring non-numeric override");
                    None
                }
            })
        };

        let pps = &mut self.procurement;
        if let Some(rows) = number("PPS_ROWS").and_then(|n| usize::try_from(n).ok()) {
            pps.rows = rows;
        }
        if let Some(pages) = number("PPS_PAGE_MAX").and_then(|n| usize::try_from(n).ok()) {
            pps.page_max = pages;
        }
        if let Some(days) = number("PPS_LOOKBACK_DAYS") {
            pps.lookback_days = days;
        }
        if let Some(div) = get("PPS_INQRY_DIV") {
            pps.inqry_div = div;
        }
        if let Some(from) = get("PPS_DATE_FROM") {
            pps.date_from = Some(from);
        }
        if let Some(to) = get("PPS_DATE_TO") {
            pps.date_to = Some(to);
        }
    }

    /// Aggregate settings for one call at `now`, with the procurement
    /// window applied so the normaliser filters on the same range the
    /// listing was queried with.
    pub fn aggregate_at(&self, now: DateTime<FixedOffset>) -> AggregateConfig {
        let mut aggregate = self.aggregate.clone();
        if self.procurement.enabled {
            aggregate.date_window = Some(self.procurement.window(now));
        }
        aggregate
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.aggregate
            .validate()
            .map_err(|e| ScoutError::Config(e.to_string()))?;
        if self.procurement.rows == 0 {
            return Err(ScoutError::Config(
                "procurement.rows must be greater than 0".into(),
            ));
        }
        if self.procurement.page_max == 0 {
            return Err(ScoutError::Config(
                "procurement.page_max must be greater than 0".into(),
            ));
        }
        if self.procurement.lookback_days < 0 {
            return Err(ScoutError::Config(
                "procurement.lookback_days must not be negative".into(),
            ));
        }
        Ok(())
    }
}
