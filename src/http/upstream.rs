//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Issue one GET per cache miss to the built target URL
//! - Buffer the full body and capture its content type
//! - Map non-2xx statuses and network failures to proxy errors
//!
//! # Design Decisions
//! - Single attempt, no retries
//! - Every fetch has a deadline (`upstream.timeout_secs`)
//! - Network error detail is logged, not returned to the caller

use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::observability::metrics;

/// Content type used when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A successful upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub body: Bytes,
    pub content_type: String,
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// GET `url`, returning the buffered body on 2xx.
    pub async fn fetch(&self, url: &str) -> Result<UpstreamResponse, ProxyError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let kind = if e.is_timeout() { "timeout" } else { "network" };
            metrics::record_upstream_error(kind);
            tracing::error!(url = %url, error = %e, "Upstream request failed");
            ProxyError::Fetch(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            metrics::record_upstream_error("status");
            tracing::warn!(url = %url, status = %status, "Upstream returned non-success status");
            return Err(ProxyError::UpstreamFailure(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let body = response.bytes().await.map_err(|e| {
            metrics::record_upstream_error("body");
            tracing::error!(url = %url, error = %e, "Failed to read upstream body");
            ProxyError::Fetch(e.to_string())
        })?;

        tracing::debug!(url = %url, status = %status, bytes = body.len(), "Fetched upstream");
        Ok(UpstreamResponse { body, content_type })
    }
}
