//! HTTP transport seam and the pooled reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::debug;

use crate::error::EngineResult;

/// One outbound request issued by a behavior.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Report key; independent of the literal URL.
    pub name: String,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            name: name.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Response as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status, or 0 when the request failed below HTTP.
    pub status: u16,
    pub bytes: usize,
    pub error: Option<String>,
}

impl HttpResponse {
    pub fn ok(status: u16, bytes: usize) -> Self {
        Self {
            status,
            bytes,
            error: None,
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            bytes: 0,
            error: Some(message.into()),
        }
    }

    pub fn is_transport_error(&self) -> bool {
        self.error.is_some() || self.status == 0
    }
}

/// Issues HTTP requests on behalf of virtual users.
///
/// Implementations must not fail: network errors come back as
/// [`HttpResponse::transport_error`]. Timeouts are the transport's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: HttpRequest) -> HttpResponse;
}

/// Transport backed by a shared, pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a request timeout and idle pool sized for
    /// the expected number of concurrent users.
    pub fn new(timeout: Duration, pool_size: usize) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: HttpRequest) -> HttpResponse {
        let HttpRequest {
            method,
            url,
            headers,
            name,
        } = request;

        match self.client.request(method, &url).headers(headers).send().await {
            Ok(response) => {
                let status = response.status().as_u16();

                // Drain the body so latency covers the full transfer
                let bytes = match response.bytes().await {
                    Ok(b) => b.len(),
                    Err(e) => {
                        debug!(name = %name, error = %e, "Failed to read response body");
                        0
                    }
                };

                HttpResponse::ok(status, bytes)
            }
            Err(e) => {
                debug!(name = %name, url = %url, error = %e, "Request failed");
                HttpResponse::transport_error(e.to_string())
            }
        }
    }
}
