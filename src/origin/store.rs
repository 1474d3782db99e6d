//! Object-store origin fetcher
//!
//! Treats the request path (minus its leading slash) as an object key in
//! the originals bucket and maps store errors into the fetch taxonomy.

use async_trait::async_trait;

use super::{FetchError, FetchResult, Fetcher};
use crate::cache::sniff_content_type;
use crate::s3::{S3Client, S3Error};

pub struct StoreFetcher {
    client: S3Client,
    bucket: String,
}

impl StoreFetcher {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Fetcher for StoreFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResult, FetchError> {
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(FetchError::InvalidPath(path.to_string()));
        }

        match self.client.get_object(&self.bucket, key).await {
            Ok(bytes) => {
                let content_type = sniff_content_type(&bytes).to_string();
                Ok(FetchResult {
                    bytes,
                    content_type,
                    status: 200,
                })
            }
            Err(S3Error::NotFound) => Err(FetchError::NotFound),
            Err(S3Error::AccessDenied) => Err(FetchError::ClientError { status: 403 }),
            Err(S3Error::Server(msg)) => {
                tracing::warn!(bucket = %self.bucket, key, error = %msg, "store origin error");
                Err(FetchError::ServerError { status: 502 })
            }
            Err(S3Error::Connection(msg)) => Err(FetchError::ConnectionFailed(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::S3Config;

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let client = S3Client::new(S3Config::new("http://127.0.0.1:9", "k", "s")).unwrap();
        let fetcher = StoreFetcher::new(client, "originals");
        let err = fetcher.fetch("/").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_unreachable_store_maps_to_connection_failed() {
        let config = S3Config {
            timeout_ms: 500,
            ..S3Config::new("http://127.0.0.1:9", "k", "s")
        };
        let client = S3Client::new(config).unwrap();
        let fetcher = StoreFetcher::new(client, "originals");
        let err = fetcher.fetch("/photo.png").await.unwrap_err();
        assert!(
            matches!(err, FetchError::ConnectionFailed(_) | FetchError::Timeout),
            "got {:?}",
            err
        );
    }
}
