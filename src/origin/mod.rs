//! Origin fetchers
//!
//! Two interchangeable backends fetch original image bytes: an HTTP origin
//! and an S3-compatible object store. Both return the payload plus a
//! content type and the upstream status, and share one error taxonomy the
//! dispatcher maps onto response codes.

pub mod http;
pub mod store;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

pub use http::HttpFetcher;
pub use store::StoreFetcher;

/// Errors from an origin fetch, mapped to response codes at dispatch
/// (NotFound → 404, Timeout → 504, ResponseTooLarge → 413, rest → 502)
#[derive(Debug, Clone)]
pub enum FetchError {
    NotFound,
    Timeout,
    ResponseTooLarge { size: usize, limit: usize },
    /// Origin failed with a 5xx; worth retrying
    ServerError { status: u16 },
    /// Origin rejected the request with a non-404 4xx; never retried
    ClientError { status: u16 },
    ConnectionFailed(String),
    InvalidPath(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "origin object not found"),
            FetchError::Timeout => write!(f, "origin fetch timed out"),
            FetchError::ResponseTooLarge { size, limit } => {
                write!(f, "origin response of {} bytes exceeds limit {}", size, limit)
            }
            FetchError::ServerError { status } => {
                write!(f, "origin returned status {}", status)
            }
            FetchError::ClientError { status } => {
                write!(f, "origin rejected request with status {}", status)
            }
            FetchError::ConnectionFailed(msg) => write!(f, "origin connection failed: {}", msg),
            FetchError::InvalidPath(path) => write!(f, "invalid origin path: {}", path),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// True for failures worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::ServerError { .. } | FetchError::ConnectionFailed(_)
        )
    }
}

/// Result of a successful origin fetch. The buffer is heap-owned; the
/// pipeline decodes from it and never borrows past its own return.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Bytes,
    pub content_type: String,
    pub status: u16,
}

/// Interface shared by the HTTP and object-store fetchers
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<FetchResult, FetchError>;
}
