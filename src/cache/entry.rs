//! Cache key and entry types
//!
//! A cache key identifies one transformed variant: the origin path, the raw
//! transform string and the resolved format string, pipe-delimited. The
//! persistent backend maps keys onto object paths by replacing `|` with `/`
//! and collapsing duplicate slashes.

use std::time::SystemTime;

use bytes::Bytes;

/// Key for a cached variant
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    /// Origin image path (no leading slash)
    pub origin_path: String,
    /// Raw transform string exactly as it appeared in the URL
    pub transform: String,
    /// Output format string, or "auto" when negotiated per request
    pub format: String,
}

impl CacheKey {
    pub fn new(
        origin_path: impl Into<String>,
        transform: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            origin_path: origin_path.into(),
            transform: transform.into(),
            format: format.into(),
        }
    }

    /// Object key for the persistent backend: `a|b|c` becomes `a/b/c`
    /// with runs of `/` collapsed
    pub fn store_key(&self) -> String {
        let joined = self.to_string().replace('|', "/");
        let mut out = String::with_capacity(joined.len());
        let mut prev_slash = false;
        for ch in joined.chars() {
            if ch == '/' {
                if !prev_slash {
                    out.push(ch);
                }
                prev_slash = true;
            } else {
                out.push(ch);
                prev_slash = false;
            }
        }
        out.trim_matches('/').to_string()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.origin_path, self.transform, self.format)
    }
}

/// A cached payload with its content type
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub content_type: String,
    pub created_at: SystemTime,
}

impl CacheEntry {
    pub fn new(data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            created_at: SystemTime::now(),
        }
    }

    /// Bytes counted against the in-process budget
    pub fn size_bytes(&self) -> usize {
        self.data.len() + self.content_type.len()
    }
}
