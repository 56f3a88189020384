//! HTTP transport seam
//!
//! The client never talks to reqwest directly: every call goes through
//! [`HttpTransport`], so watches and CRUD wrappers can be exercised against
//! the in-memory mock in unit tests.

use crate::error::TransportError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Incrementally readable response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Trait for the HTTP operations the client needs
///
/// Implementations must be safe for concurrent use: several watch
/// registrations may share one transport.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a plain request and return the full response body
    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> Result<Bytes, TransportError>;

    /// Issue a streaming GET; the body is handed back unread
    async fn stream(&self, uri: &str) -> Result<ByteStream, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a transport over a pre-built reqwest client
    ///
    /// # Arguments
    /// * `client` - Configured reqwest client (TLS, default headers)
    /// * `base_url` - API server base URL (e.g., "https://kubernetes.default.svc")
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: None,
        }
    }

    /// Apply a timeout to plain requests (streaming requests never time out)
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Turn non-success statuses into transport failures
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> Result<Bytes, TransportError> {
        let url = self.build_url(uri);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json");
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = check_status(builder.send().await?).await?;
        Ok(response.bytes().await?)
    }

    async fn stream(&self, uri: &str) -> Result<ByteStream, TransportError> {
        let url = self.build_url(uri);
        debug!("GET {} (streaming)", url);

        // No per-request timeout: a watch stays open as long as the server allows.
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::Http)),
        ))
    }
}
