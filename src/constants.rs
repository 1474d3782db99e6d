// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default maximum request size in bytes (request line + headers)
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Default maximum concurrent connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

// =============================================================================
// Origin defaults
// =============================================================================

/// Default origin fetch timeout in milliseconds
pub const DEFAULT_ORIGIN_TIMEOUT_MS: u64 = 10_000;

/// Default maximum retry attempts for transient origin failures
pub const DEFAULT_ORIGIN_MAX_RETRIES: u32 = 2;

/// Default maximum origin response size (50 MB)
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 50 * 1024 * 1024;

/// User-Agent sent on origin requests
pub const ORIGIN_USER_AGENT: &str = concat!("zimgx/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Transform defaults
// =============================================================================

/// Maximum output dimension on either axis
pub const MAX_DIMENSION: u32 = 8192;

/// Default output quality
pub const DEFAULT_QUALITY: u8 = 80;

/// Default maximum source pixels (decompression bomb guard)
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Default maximum frames decoded from an animated source
pub const DEFAULT_MAX_FRAMES: u32 = 100;

/// Default budget for total animated pixels (width * page height * frames)
pub const DEFAULT_MAX_ANIMATED_PIXELS: u64 = 50_000_000;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default in-process cache budget in bytes (256 MB)
pub const DEFAULT_CACHE_MAX_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// Default Cache-Control max-age in seconds
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 86_400;

// =============================================================================
// Response defaults
// =============================================================================

/// Number of leading bytes hashed into the ETag fingerprint
pub const ETAG_SAMPLE_BYTES: usize = 8192;
