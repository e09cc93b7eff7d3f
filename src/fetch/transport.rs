//! HTTP transport boundary
//!
//! The fetch pipeline only needs three things from the network: a JSON GET
//! for ref listings, an existence probe and a streamed body for archives.
//! [`Transport`] captures exactly that so the pipeline can run against
//! [`HttpTransport`](super::http::HttpTransport) or an in-memory fake.

use std::future::Future;

use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors produced by a [`Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("HTTP {status} for URL: {url}")]
    Status { url: String, status: u16 },

    /// The request never produced a response (DNS, connect, TLS, timeout)
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The response body could not be decoded
    #[error("Invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    /// HTTP status if the server responded at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One page of a JSON listing
#[derive(Debug, Clone)]
pub struct JsonPage {
    pub body: serde_json::Value,
    /// Absolute URL of the next page, when the server advertises one via `Link`
    pub next: Option<String>,
}

/// A successful archive response, body not yet consumed
pub struct ArchiveStream {
    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl std::fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Network operations used by the fetch pipeline
///
/// Implementations must return [`TransportError::Status`] for any
/// non-success response so callers can tell a definite negative answer from
/// a connectivity failure.
pub trait Transport: Send + Sync {
    /// GET `url` and decode the body as JSON
    fn get_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> impl Future<Output = Result<JsonPage, TransportError>> + Send;

    /// Check that `url` answers with a success status
    fn probe(&self, url: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start streaming the body at `url`
    fn open(&self, url: &str) -> impl Future<Output = Result<ArchiveStream, TransportError>> + Send;
}
