//! Persistent cache backend over an S3-compatible object store
//!
//! Variants are stored under object keys derived from the cache key
//! (`a|b|c` → `a/b/c`). Reads sniff the content type from magic bytes
//! because stores commonly return `application/octet-stream` for uploaded
//! variants. Writes are best-effort: a failed put is logged and surfaces
//! as a later miss.

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey};
use super::traits::Cache;
use crate::s3::{S3Client, S3Error};

/// Sniff an image content type from magic bytes; falls back to
/// `application/octet-stream`
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 8 && bytes[0..4] == [0x89, 0x50, 0x4E, 0x47] {
        return "image/png";
    }
    if bytes.len() >= 2 && bytes[0..2] == [0xFF, 0xD8] {
        return "image/jpeg";
    }
    if bytes.len() >= 4 && &bytes[0..4] == b"GIF8" {
        return "image/gif";
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    // ISO BMFF: ....ftyp{avif,avis,heic,heix,mif1}
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"avif" | b"avis" | b"heic" | b"heix" | b"mif1" => return "image/avif",
            _ => {}
        }
    }
    "application/octet-stream"
}

/// Cache layer backed by a bucket in an S3-compatible store
pub struct StoreCache {
    client: S3Client,
    bucket: String,
}

impl StoreCache {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Cache for StoreCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let object_key = key.store_key();
        match self.client.get_object(&self.bucket, &object_key).await {
            Ok(bytes) => {
                let content_type = sniff_content_type(&bytes);
                Some(CacheEntry::new(bytes, content_type))
            }
            Err(S3Error::NotFound) => None,
            Err(err) => {
                tracing::warn!(bucket = %self.bucket, key = %object_key, error = %err,
                    "persistent cache read failed");
                None
            }
        }
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) {
        let object_key = key.store_key();
        if let Err(err) = self
            .client
            .put_object(&self.bucket, &object_key, entry.data, &entry.content_type)
            .await
        {
            tracing::warn!(bucket = %self.bucket, key = %object_key, error = %err,
                "persistent cache write failed");
        }
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let object_key = key.store_key();
        match self.client.delete_object(&self.bucket, &object_key).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(bucket = %self.bucket, key = %object_key, error = %err,
                    "persistent cache delete failed");
                false
            }
        }
    }

    async fn clear(&self) {
        // Bulk deletion of a bucket is an operator action, not a cache call
        tracing::debug!(bucket = %self.bucket, "clear is a no-op for the persistent backend");
    }

    async fn size(&self) -> usize {
        // Not trackable without listing the bucket
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_png() {
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff_content_type(&bytes), "image/png");
    }

    #[test]
    fn test_sniff_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(sniff_content_type(&bytes), "image/jpeg");
    }

    #[test]
    fn test_sniff_gif() {
        assert_eq!(sniff_content_type(b"GIF89a______"), "image/gif");
    }

    #[test]
    fn test_sniff_webp() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBP");
        assert_eq!(sniff_content_type(&bytes), "image/webp");
    }

    #[test]
    fn test_sniff_avif_ftyp_brands() {
        for brand in [&b"avif"[..], b"avis", b"heic", b"heix", b"mif1"] {
            let mut bytes = vec![0, 0, 0, 0x20];
            bytes.extend_from_slice(b"ftyp");
            bytes.extend_from_slice(brand);
            assert_eq!(sniff_content_type(&bytes), "image/avif", "brand {:?}", brand);
        }
    }

    #[test]
    fn test_sniff_unknown_is_octet_stream() {
        assert_eq!(sniff_content_type(b"hello"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "application/octet-stream");
    }
}
