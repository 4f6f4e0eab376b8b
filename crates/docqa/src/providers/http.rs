//! Shared reqwest plumbing for remote providers

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Build an HTTP client with a whole-request timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Send a prepared request and return the body of a 2xx response
///
/// Non-2xx statuses become [`Error::Upstream`] so they are retried.
pub(crate) async fn send_for_body(request: reqwest::RequestBuilder, service: &str) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(Error::upstream(service, status.as_u16(), truncate(&body, 500)));
    }
    Ok(body)
}

/// Parse a 2xx body, mapping schema mismatches to [`Error::MalformedResponse`]
pub(crate) fn parse_body<T: for<'de> Deserialize<'de>>(body: &str, service: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::malformed(format!("{} response: {}", service, e)))
}

/// Configured base URL without a trailing slash, else `default`
pub(crate) fn resolve_base_url(configured: Option<&str>, default: &str) -> String {
    configured.unwrap_or(default).trim_end_matches('/').to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Reply {
        text: String,
    }

    #[test]
    fn test_parse_body_schema_mismatch_is_malformed() {
        let ok: Reply = parse_body(r#"{"text":"hi"}"#, "svc").unwrap();
        assert_eq!(ok.text, "hi");

        let err = parse_body::<Reply>(r#"{"other":1}"#, "svc").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
