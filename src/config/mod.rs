//! Environment-based configuration.
//!
//! All settings come from `ZIMGX_*` environment variables, grouped into
//! sections mirroring the subsystems they configure:
//! - `ZIMGX_SERVER_*` - bind address, timeouts, connection limits
//! - `ZIMGX_ORIGIN_*` - where original images are fetched from
//! - `ZIMGX_TRANSFORM_*` - pipeline limits and defaults
//! - `ZIMGX_CACHE_*` - in-process cache budget and TTL
//! - `ZIMGX_R2_*` - S3-compatible object store credentials and buckets
//!
//! Default values are sourced from `crate::constants`. Malformed values are
//! configuration errors; the process exits non-zero on them.

use std::collections::HashMap;
use std::fmt;

use crate::constants::{
    DEFAULT_CACHE_MAX_SIZE_BYTES, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_HOST,
    DEFAULT_MAX_ANIMATED_PIXELS, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_FRAMES, DEFAULT_MAX_PIXELS,
    DEFAULT_MAX_REQUEST_SIZE, DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_ORIGIN_MAX_RETRIES,
    DEFAULT_ORIGIN_TIMEOUT_MS, DEFAULT_PORT, DEFAULT_QUALITY, DEFAULT_REQUEST_TIMEOUT_MS,
    MAX_DIMENSION,
};

/// Configuration loading error
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    fn new(variable: &str, message: impl Into<String>) -> Self {
        Self {
            variable: variable.to_string(),
            message: message.into(),
        }
    }
}

/// Which origin backend serves original images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginType {
    Http,
    S3,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_ms: u64,
    pub max_request_size: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OriginConfig {
    pub origin_type: OriginType,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    /// Optional prefix stripped from request paths before the origin lookup
    pub path_prefix: Option<String>,
    pub max_response_size: usize,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            origin_type: OriginType::Http,
            base_url: String::new(),
            timeout_ms: DEFAULT_ORIGIN_TIMEOUT_MS,
            max_retries: DEFAULT_ORIGIN_MAX_RETRIES,
            path_prefix: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub default_quality: u8,
    pub max_pixels: u64,
    pub strip_metadata: bool,
    pub max_frames: u32,
    pub max_animated_pixels: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            default_quality: DEFAULT_QUALITY,
            max_pixels: DEFAULT_MAX_PIXELS,
            strip_metadata: true,
            max_frames: DEFAULT_MAX_FRAMES,
            max_animated_pixels: DEFAULT_MAX_ANIMATED_PIXELS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: DEFAULT_CACHE_MAX_SIZE_BYTES,
            default_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

/// S3-compatible object store settings (Cloudflare R2, MinIO, AWS S3)
#[derive(Debug, Clone, Default)]
pub struct R2Config {
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Bucket holding original images (object-store origin)
    pub bucket_originals: String,
    /// Bucket holding transformed variants (persistent cache layer)
    pub bucket_variants: String,
}

impl R2Config {
    /// True when enough is configured to build a signed client
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
            && !self.access_key_id.is_empty()
            && !self.secret_access_key.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub origin: OriginConfig,
    pub transform: TransformConfig,
    pub cache: CacheConfig,
    pub r2: R2Config,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("ZIMGX_"))
            .collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit variable map (testable entry point)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(host) = vars.get("ZIMGX_SERVER_HOST") {
            config.server.host = host.clone();
        }
        config.server.port = parse_or(vars, "ZIMGX_SERVER_PORT", config.server.port)?;
        config.server.request_timeout_ms = parse_or(
            vars,
            "ZIMGX_SERVER_REQUEST_TIMEOUT_MS",
            config.server.request_timeout_ms,
        )?;
        config.server.max_request_size = parse_or(
            vars,
            "ZIMGX_SERVER_MAX_REQUEST_SIZE",
            config.server.max_request_size,
        )?;
        config.server.max_connections = parse_or(
            vars,
            "ZIMGX_SERVER_MAX_CONNECTIONS",
            config.server.max_connections,
        )?;
        if config.server.max_connections == 0 {
            return Err(ConfigError::new(
                "ZIMGX_SERVER_MAX_CONNECTIONS",
                "must be at least 1",
            ));
        }

        if let Some(kind) = vars.get("ZIMGX_ORIGIN_TYPE") {
            config.origin.origin_type = match kind.to_lowercase().as_str() {
                "http" => OriginType::Http,
                "s3" | "r2" => OriginType::S3,
                other => {
                    return Err(ConfigError::new(
                        "ZIMGX_ORIGIN_TYPE",
                        format!("unknown origin type: {}", other),
                    ))
                }
            };
        }
        if let Some(url) = vars.get("ZIMGX_ORIGIN_BASE_URL") {
            config.origin.base_url = url.trim_end_matches('/').to_string();
        }
        config.origin.timeout_ms =
            parse_or(vars, "ZIMGX_ORIGIN_TIMEOUT_MS", config.origin.timeout_ms)?;
        config.origin.max_retries =
            parse_or(vars, "ZIMGX_ORIGIN_MAX_RETRIES", config.origin.max_retries)?;
        if let Some(prefix) = vars.get("ZIMGX_ORIGIN_PATH_PREFIX") {
            let trimmed = prefix.trim_matches('/');
            if !trimmed.is_empty() {
                config.origin.path_prefix = Some(trimmed.to_string());
            }
        }

        config.transform.max_width =
            parse_or(vars, "ZIMGX_TRANSFORM_MAX_WIDTH", config.transform.max_width)?;
        config.transform.max_height = parse_or(
            vars,
            "ZIMGX_TRANSFORM_MAX_HEIGHT",
            config.transform.max_height,
        )?;
        config.transform.default_quality = parse_or(
            vars,
            "ZIMGX_TRANSFORM_DEFAULT_QUALITY",
            config.transform.default_quality,
        )?;
        if !(1..=100).contains(&config.transform.default_quality) {
            return Err(ConfigError::new(
                "ZIMGX_TRANSFORM_DEFAULT_QUALITY",
                "must be 1-100",
            ));
        }
        config.transform.max_pixels =
            parse_or(vars, "ZIMGX_TRANSFORM_MAX_PIXELS", config.transform.max_pixels)?;
        config.transform.strip_metadata = parse_bool_or(
            vars,
            "ZIMGX_TRANSFORM_STRIP_METADATA",
            config.transform.strip_metadata,
        )?;
        config.transform.max_frames =
            parse_or(vars, "ZIMGX_TRANSFORM_MAX_FRAMES", config.transform.max_frames)?;
        config.transform.max_animated_pixels = parse_or(
            vars,
            "ZIMGX_TRANSFORM_MAX_ANIMATED_PIXELS",
            config.transform.max_animated_pixels,
        )?;

        config.cache.enabled = parse_bool_or(vars, "ZIMGX_CACHE_ENABLED", config.cache.enabled)?;
        config.cache.max_size_bytes = parse_or(
            vars,
            "ZIMGX_CACHE_MAX_SIZE_BYTES",
            config.cache.max_size_bytes,
        )?;
        config.cache.default_ttl_seconds = parse_or(
            vars,
            "ZIMGX_CACHE_DEFAULT_TTL_SECONDS",
            config.cache.default_ttl_seconds,
        )?;

        if let Some(endpoint) = vars.get("ZIMGX_R2_ENDPOINT") {
            config.r2.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        }
        if let Some(key) = vars.get("ZIMGX_R2_ACCESS_KEY_ID") {
            config.r2.access_key_id = key.clone();
        }
        if let Some(secret) = vars.get("ZIMGX_R2_SECRET_ACCESS_KEY") {
            config.r2.secret_access_key = secret.clone();
        }
        if let Some(bucket) = vars.get("ZIMGX_R2_BUCKET_ORIGINALS") {
            config.r2.bucket_originals = bucket.clone();
        }
        if let Some(bucket) = vars.get("ZIMGX_R2_BUCKET_VARIANTS") {
            config.r2.bucket_variants = bucket.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.origin.origin_type {
            OriginType::Http => {
                if self.origin.base_url.is_empty() {
                    return Err(ConfigError::new(
                        "ZIMGX_ORIGIN_BASE_URL",
                        "required for http origin",
                    ));
                }
            }
            OriginType::S3 => {
                if !self.r2.is_configured() {
                    return Err(ConfigError::new(
                        "ZIMGX_R2_ENDPOINT",
                        "s3 origin requires endpoint and credentials",
                    ));
                }
                if self.r2.bucket_originals.is_empty() {
                    return Err(ConfigError::new(
                        "ZIMGX_R2_BUCKET_ORIGINALS",
                        "required for s3 origin",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::new(name, format!("cannot parse {:?}", raw))),
        None => Ok(default),
    }
}

fn parse_bool_or(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::new(name, format!("not a boolean: {:?}", other))),
        },
        None => Ok(default),
    }
}
