//! Signed S3-compatible client
//!
//! A small client for S3-compatible stores (Cloudflare R2, MinIO, AWS S3)
//! covering exactly what the proxy needs: GET, PUT and DELETE of objects
//! with AWS Signature V4, path-style addressing. Signing is a pure
//! deterministic function of its inputs and unit-tested against fixed
//! timestamps.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::constants::ORIGIN_USER_AGENT;

type HmacSha256 = Hmac<Sha256>;

/// S3 client errors mapped from HTTP responses
#[derive(Debug, Clone)]
pub enum S3Error {
    /// Object or bucket does not exist
    NotFound,
    /// Credentials rejected
    AccessDenied,
    /// Store-side failure (5xx)
    Server(String),
    /// Transport-level failure
    Connection(String),
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S3Error::NotFound => write!(f, "object not found"),
            S3Error::AccessDenied => write!(f, "access denied"),
            S3Error::Server(msg) => write!(f, "store error: {}", msg),
            S3Error::Connection(msg) => write!(f, "connection failed: {}", msg),
        }
    }
}

impl std::error::Error for S3Error {}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL without trailing slash (e.g. `https://acct.r2.cloudflarestorage.com`)
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Signing region; R2 uses `auto`
    pub region: String,
    pub timeout_ms: u64,
}

impl S3Config {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: "auto".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Inputs to the SigV4 signature, all caller-provided so signing stays
/// deterministic and testable
pub struct SigningParams<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub payload_hash: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    /// Format: YYYYMMDD
    pub date: &'a str,
    /// Format: YYYYMMDDTHHMMSSZ
    pub datetime: &'a str,
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Step 1: canonical request. Headers are already lowercase-keyed and
/// sorted by the BTreeMap.
fn canonical_request(params: &SigningParams) -> String {
    let canonical_headers: String = params
        .headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();
    let signed_headers = signed_header_list(params.headers);

    format!(
        "{}\n{}\n\n{}\n{}\n{}",
        params.method, params.uri, canonical_headers, signed_headers, params.payload_hash
    )
}

fn signed_header_list(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

/// Step 2: string to sign
fn string_to_sign(params: &SigningParams) -> String {
    let scope = format!("{}/{}/s3/aws4_request", params.date, params.region);
    format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        params.datetime,
        scope,
        sha256_hex(canonical_request(params).as_bytes())
    )
}

/// Step 3: derive the signing key from the secret
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

/// Steps 4-5: signature and Authorization header value
pub fn sign_request(params: &SigningParams) -> String {
    let signing_key = derive_signing_key(params.secret_key, params.date, params.region);
    let signature = hex::encode(hmac_sha256(
        &signing_key,
        string_to_sign(params).as_bytes(),
    ));
    let scope = format!("{}/{}/s3/aws4_request", params.date, params.region);

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        params.access_key,
        scope,
        signed_header_list(params.headers),
        signature
    )
}

/// S3-compatible client issuing signed requests over reqwest
#[derive(Debug, Clone)]
pub struct S3Client {
    config: S3Config,
    http: reqwest::Client,
}

impl S3Client {
    pub fn new(config: S3Config) -> Result<Self, S3Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(ORIGIN_USER_AGENT)
            .build()
            .map_err(|e| S3Error::Connection(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// Host portion of the endpoint, used as the `host` header
    fn host(&self) -> String {
        self.config
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string()
    }

    /// Signed headers for a request; timestamps come from the clock here,
    /// the pure signing path below stays deterministic.
    fn signed_headers(
        &self,
        method: &str,
        uri: &str,
        payload: &[u8],
    ) -> BTreeMap<String, String> {
        let now = chrono::Utc::now();
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = sha256_hex(payload);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), datetime.clone());

        let authorization = sign_request(&SigningParams {
            method,
            uri,
            headers: &headers,
            payload_hash: &payload_hash,
            access_key: &self.config.access_key_id,
            secret_key: &self.config.secret_access_key,
            region: &self.config.region,
            date: &date,
            datetime: &datetime,
        });
        headers.insert("authorization".to_string(), authorization);
        headers
    }

    async fn send(
        &self,
        method: reqwest::Method,
        bucket: &str,
        key: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, S3Error> {
        let uri = format!("/{}/{}", bucket, key);
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), uri);
        let payload = body.clone().unwrap_or_default();

        let mut request = self.http.request(method.clone(), &url);
        for (name, value) in self.signed_headers(method.as_str(), &uri, &payload) {
            // reqwest sets host itself from the URL
            if name != "host" {
                request = request.header(&name, &value);
            }
        }
        if let Some(ct) = content_type {
            request = request.header("content-type", ct);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| S3Error::Connection(e.to_string()))
    }

    fn map_status(status: reqwest::StatusCode) -> Option<S3Error> {
        if status.is_success() {
            return None;
        }
        Some(match status.as_u16() {
            404 => S3Error::NotFound,
            401 | 403 => S3Error::AccessDenied,
            code if code >= 500 => S3Error::Server(format!("upstream status {}", code)),
            code => S3Error::Server(format!("unexpected status {}", code)),
        })
    }

    /// Fetch an object's bytes
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, S3Error> {
        let response = self
            .send(reqwest::Method::GET, bucket, key, None, None)
            .await?;
        if let Some(err) = Self::map_status(response.status()) {
            return Err(err);
        }
        response
            .bytes()
            .await
            .map_err(|e| S3Error::Connection(e.to_string()))
    }

    /// Store an object
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), S3Error> {
        let response = self
            .send(
                reqwest::Method::PUT,
                bucket,
                key,
                Some(body),
                Some(content_type),
            )
            .await?;
        match Self::map_status(response.status()) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Delete an object; `Ok(true)` when the store acknowledged a deletion
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<bool, S3Error> {
        let response = self
            .send(reqwest::Method::DELETE, bucket, key, None, None)
            .await?;
        match Self::map_status(response.status()) {
            None => Ok(true),
            Some(S3Error::NotFound) => Ok(false),
            Some(err) => Err(err),
        }
    }
}
