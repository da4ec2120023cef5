//! Shared HTTP client for provider calls.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

/// Default timeout for provider requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

static CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

/// Get the process-wide HTTP client, building it on first use.
pub fn get_http_client() -> Result<&'static reqwest::Client> {
    CLIENT.get_or_try_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")
    })
}
