//! Kubernetes client errors

use reqwest::Method;
use thiserror::Error;

/// Errors raised by an [`HttpTransport`](crate::transport::HttpTransport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request/response error from the underlying client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API server answered with a non-success status
    #[error("API server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// Connection-level failure not originating from reqwest
    #[error("Connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// HTTP status code associated with the failure, if any
    pub fn code(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Connection(_) => None,
        }
    }
}

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum KubernetesError {
    /// Issuing or completing an HTTP call failed
    #[error("Failed requesting {method} on `{uri}`: {source}")]
    Request {
        /// HTTP method of the failed call
        method: Method,
        /// Request URI, including the query string
        uri: String,
        /// Transport failure
        #[source]
        source: TransportError,
    },

    /// A response was received but its body is not valid JSON
    #[error("Failed decoding response JSON: {0}")]
    Response(#[source] serde_json::Error),

    /// A response decoded fine but lacks a field the client relies on
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// A framed watch record failed to decode mid-stream
    #[error("Failed decoding watch stream record `{raw}`: {source}")]
    StreamDecode {
        /// Raw frame contents, delimiter stripped
        raw: String,
        /// Parser diagnostic
        #[source]
        source: serde_json::Error,
    },

    /// Invalid client configuration (unreadable token, bad TLS material, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KubernetesError {
    /// Failure category, as reported in watch retry logs
    pub fn category(&self) -> &'static str {
        match self {
            KubernetesError::Request { .. } => "RequestError",
            KubernetesError::Response(_) | KubernetesError::ResponseShape(_) => "ResponseError",
            KubernetesError::StreamDecode { .. } => "StreamDecodeError",
            KubernetesError::InvalidConfig(_) => "InvalidConfig",
        }
    }

    /// Error code if available (the HTTP status for request failures)
    pub fn code(&self) -> Option<u16> {
        match self {
            KubernetesError::Request { source, .. } => source.code(),
            _ => None,
        }
    }
}
