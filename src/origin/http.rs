//! HTTP origin fetcher
//!
//! Fetches originals from an upstream HTTP server. URL joining normalises
//! slashes, response size is enforced against the configured limit, and
//! transient failures are retried with a short backoff.

use std::time::Duration;

use async_trait::async_trait;

use super::{FetchError, FetchResult, Fetcher};
use crate::config::OriginConfig;
use crate::constants::ORIGIN_USER_AGENT;

pub struct HttpFetcher {
    base_url: String,
    max_response_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &OriginConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(ORIGIN_USER_AGENT)
            .build()
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_response_size: config.max_response_size,
            max_retries: config.max_retries,
            client,
        })
    }

    fn url_for(&self, path: &str) -> Result<String, FetchError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, trimmed))
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        match status {
            404 => return Err(FetchError::NotFound),
            s if s >= 500 => return Err(FetchError::ServerError { status: s }),
            // other 4xx are permanent; retrying them would not help
            s if s >= 400 => return Err(FetchError::ClientError { status: s }),
            _ => {}
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_response_size {
                return Err(FetchError::ResponseTooLarge {
                    size: length as usize,
                    limit: self.max_response_size,
                });
            }
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::ConnectionFailed(e.to_string())
            }
        })?;

        if bytes.len() > self.max_response_size {
            return Err(FetchError::ResponseTooLarge {
                size: bytes.len(),
                limit: self.max_response_size,
            });
        }

        Ok(FetchResult {
            bytes,
            content_type,
            status,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResult, FetchError> {
        let url = self.url_for(path)?;

        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(url = %url, attempt, error = %err, "retrying origin fetch");
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
