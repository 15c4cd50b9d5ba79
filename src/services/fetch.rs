//! Outbound HTTP plumbing
//!
//! Everything that talks to an upstream service goes through `HttpTransport`, so
//! resolvers and providers can be exercised against scripted responses. The
//! retrying helper `fetch_with_retry` sits on top of the transport.

use std::time::Duration;

use reqwest::{Client as HttpClient, Url};
use serde::de::DeserializeOwned;

use crate::error::{FetchError, TransportError};

const USER_AGENT: &str = "VibeReel/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully built outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// GET `base` with percent-encoded query parameters
    pub fn get(base: &str, params: &[(&str, &str)]) -> Result<Self, TransportError> {
        let url = Url::parse_with_params(base, params).map_err(|e| TransportError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn post_json(url: &str, body: serde_json::Value) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        })
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// URL without the query string, safe to log (keys travel in the query)
    pub fn log_target(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Throttling and server faults are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one exchange; any HTTP status counts as a response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: HttpClient,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&request.url),
            Method::Post => self.http_client.post(&request.url),
        };

        builder = builder.header(reqwest::header::ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        tracing::debug!(
            url = %request.log_target(),
            status,
            bytes = body.len(),
            "Upstream responded"
        );

        Ok(HttpResponse { status, body })
    }
}

/// Bounded linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before retry `n` is `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// GET-style fetch that retries 429, 5xx and network failures.
///
/// Any other response, including 4xx, is returned as-is for the caller to
/// inspect. The only cancellation point is the sleep between attempts.
pub async fn fetch_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: RetryPolicy,
) -> Result<HttpResponse, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match transport.send(request.clone()).await {
            Ok(response) if response.is_retryable() => {
                last_error = format!("upstream status {}", response.status);
            }
            Ok(response) => return Ok(response),
            Err(e) => last_error = e.to_string(),
        }

        tracing::warn!(
            url = %request.log_target(),
            attempt,
            max_attempts,
            error = %last_error,
            "Fetch attempt failed"
        );

        if attempt < max_attempts {
            tokio::time::sleep(policy.base_delay * attempt).await;
        }
    }

    Err(FetchError::MaxRetriesExceeded {
        attempts: max_attempts,
        last_error,
    })
}
