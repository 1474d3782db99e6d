//! Intermediate server response
//!
//! `ServerResponse` carries everything the connection loop needs to
//! serialise a response, which keeps the dispatch logic pure and testable
//! without a socket. Bodies are owned `Bytes`; dropping the response frees
//! them.

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::constants::ETAG_SAMPLE_BYTES;
use crate::error::ProxyError;

#[derive(Debug, Clone)]
pub struct ServerResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    pub cache_control: Option<String>,
    pub etag: Option<String>,
    pub vary: Option<&'static str>,
}

impl ServerResponse {
    /// JSON response with no caching headers
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: Bytes::from(body),
            cache_control: None,
            etag: None,
            vary: None,
        }
    }

    /// Error response with the standard JSON error body
    pub fn error(err: &ProxyError) -> Self {
        Self::json(err.status(), err.to_json_body())
    }

    /// Image payload with full caching headers
    pub fn image(body: Bytes, content_type: impl Into<String>, ttl_seconds: u64) -> Self {
        let etag = compute_etag(&body);
        Self {
            status: 200,
            content_type: content_type.into(),
            body,
            cache_control: Some(format!("public, max-age={}", ttl_seconds)),
            etag: Some(etag),
            vary: Some("Accept"),
        }
    }

    /// 304 with the ETag only
    pub fn not_modified(etag: String) -> Self {
        Self {
            status: 304,
            content_type: String::new(),
            body: Bytes::new(),
            cache_control: None,
            etag: Some(etag),
            vary: None,
        }
    }
}

/// Deterministic 16-lowercase-hex fingerprint: a 64-bit digest of the
/// first 8192 bytes XORed with the full length
pub fn compute_etag(data: &[u8]) -> String {
    let sample = &data[..data.len().min(ETAG_SAMPLE_BYTES)];
    let digest = Sha256::digest(sample);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let fingerprint = u64::from_be_bytes(head) ^ data.len() as u64;
    format!("{:016x}", fingerprint)
}

/// Does an If-None-Match header match this ETag, after stripping the weak
/// prefix and quotes
pub fn if_none_match_matches(header: &str, etag: &str) -> bool {
    header.split(',').any(|candidate| {
        let cleaned = candidate
            .trim()
            .trim_start_matches("W/")
            .trim_matches('"');
        cleaned == etag || cleaned == "*"
    })
}

/// Reason phrase for the status line
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_is_16_lowercase_hex() {
        let etag = compute_etag(b"hello world");
        assert_eq!(etag.len(), 16);
        assert!(etag
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn test_etag_deterministic() {
        assert_eq!(compute_etag(b"same bytes"), compute_etag(b"same bytes"));
    }

    #[test]
    fn test_etag_differs_on_content_and_length() {
        assert_ne!(compute_etag(b"aaaa"), compute_etag(b"aaab"));
        assert_ne!(compute_etag(b"aaaa"), compute_etag(b"aaaaa"));
    }

    #[test]
    fn test_etag_differs_past_sample_window_by_length() {
        // two buffers equal in the first 8192 bytes but different lengths
        let a = vec![7u8; 10_000];
        let b = vec![7u8; 10_001];
        assert_ne!(compute_etag(&a), compute_etag(&b));
    }

    #[test]
    fn test_if_none_match_strips_weak_and_quotes() {
        assert!(if_none_match_matches("\"abc123\"", "abc123"));
        assert!(if_none_match_matches("W/\"abc123\"", "abc123"));
        assert!(if_none_match_matches("abc123", "abc123"));
        assert!(if_none_match_matches("*", "anything"));
        assert!(!if_none_match_matches("\"other\"", "abc123"));
    }

    #[test]
    fn test_if_none_match_list() {
        assert!(if_none_match_matches("\"x\", \"y\", \"abc\"", "abc"));
    }

    #[test]
    fn test_image_response_has_caching_headers() {
        let response = ServerResponse::image(Bytes::from("img"), "image/png", 3600);
        assert_eq!(response.status, 200);
        assert_eq!(
            response.cache_control.as_deref(),
            Some("public, max-age=3600")
        );
        assert!(response.etag.is_some());
        assert_eq!(response.vary, Some("Accept"));
    }

    #[test]
    fn test_not_modified_has_empty_body() {
        let response = ServerResponse::not_modified("abc".to_string());
        assert_eq!(response.status, 304);
        assert!(response.body.is_empty());
        assert_eq!(response.etag.as_deref(), Some("abc"));
    }

    #[test]
    fn test_error_response_body_is_json() {
        let response = ServerResponse::error(&ProxyError::NotFound);
        assert_eq!(response.status, 404);
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed["error"]["status"], 404);
    }
}
