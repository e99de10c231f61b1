//! HTTP transport port and its reqwest implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// HTTP request timeout for model calls.
///
/// Long enough for slow local models, short enough to fail a hung socket.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// A JSON POST request. Owned and cloneable so every attempt can send a
/// fresh copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Full endpoint URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: String,
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure: no HTTP response was obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established or was dropped.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request exceeded the transport timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Anything else, such as an invalid URL.
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure is network-level and worth retrying.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }
}

/// Sends HTTP requests.
pub trait Transport: Send + Sync {
    /// Sends `request` and reads the whole response.
    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;
}

/// [`Transport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport with the standard request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Builds a transport with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(url = %request.url, body_len = request.body.len(), "Sending HTTP request");

            let mut builder = self.client.post(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let response = builder
                .body(request.body)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response
                .text()
                .await
                .map_err(|e| classify_reqwest_error(&e))?;

            debug!(status, body_len = body.len(), "Received HTTP response");
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse::new(429, "").with_header("Retry-After", "2");
        assert_eq!(response.header("retry-after"), Some("2"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn network_errors_are_flagged() {
        assert!(TransportError::Connect("refused".into()).is_network());
        assert!(TransportError::Timeout("slow".into()).is_network());
        assert!(!TransportError::Other("bad url".into()).is_network());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connect_error() {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap();
        let request = HttpRequest {
            // Port 9 (discard) on loopback is closed on test machines.
            url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            headers: Vec::new(),
            body: "{}".to_string(),
        };
        let err = transport.send(request).await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
    }
}
