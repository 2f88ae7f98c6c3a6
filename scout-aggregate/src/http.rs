//! Shared HTTP client construction for the provider adapters.
//!
//! Provides a configured [`reqwest::Client`] with browser-like headers,
//! cookie support, and a rotating User-Agent for page fetches.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::error::AdapterError;

/// Browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a client whose requests give up after `timeout`.
///
/// Uses `user_agent` when given, otherwise a random browser UA.
///
/// # Errors
///
/// Returns [`AdapterError::Transport`] if the client cannot be constructed.
pub fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, AdapterError> {
    let ua = match user_agent {
        Some(custom) => custom,
        None => random_user_agent(),
    };
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AdapterError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Map a non-success status onto the adapter taxonomy.
pub fn status_error(status: reqwest::StatusCode, provider: &str) -> AdapterError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        AdapterError::CredentialMissing(format!("{provider} rejected credentials (HTTP {status})"))
    } else {
        AdapterError::Transport(format!("{provider} returned HTTP {status}"))
    }
}
