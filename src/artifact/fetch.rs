//! Remote dataset download

use crate::error::{FlowError, Result};
use std::time::Duration;
use tracing::{debug, info};

const MAX_REDIRECTS: usize = 5;

/// Build a blocking HTTP client with a bounded redirect chain
pub fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(concat!("boostflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FlowError::ConfigError(format!("failed to create HTTP client: {}", e)))
}

/// Only plain http(s) sources are downloadable
pub fn validate_url(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| FlowError::DataFetch(format!("invalid URL {}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FlowError::DataFetch(format!(
            "unsupported URL scheme `{}` in {}",
            other, raw
        ))),
    }
}

/// GET a URL and return the body, failing on non-success status codes
pub fn download(client: &reqwest::blocking::Client, raw: &str) -> Result<Vec<u8>> {
    let url = validate_url(raw)?;
    debug!(url = %url, "Downloading artifact");

    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| FlowError::DataFetch(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FlowError::DataFetch(format!(
            "GET {} returned HTTP {}",
            url, status
        )));
    }

    let body = response
        .bytes()
        .map_err(|e| FlowError::DataFetch(format!("reading body of {} failed: {}", url, e)))?;
    info!(url = %url, bytes = body.len(), "Downloaded artifact");
    Ok(body.to_vec())
}
