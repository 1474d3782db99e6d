//! Request dispatch
//!
//! `dispatch` is a pure function over the shared server state: it routes,
//! consults the cache, fetches from the origin, runs the pipeline and
//! builds the intermediate response. The connection loop only serialises
//! what comes back.

use std::sync::Arc;

use bytes::Bytes;

use super::response::{compute_etag, if_none_match_matches, ServerResponse};
use crate::cache::{sniff_content_type, Cache, CacheEntry, CacheKey};
use crate::config::Config;
use crate::error::ProxyError;
use crate::imaging::{self, AnimConfig, ImageError, OutputFormat, TransformParams};
use crate::metrics::Metrics;
use crate::origin::{FetchError, Fetcher};
use crate::router::Route;

/// Everything a request needs, shared across connections
pub struct ServerState {
    pub config: Config,
    pub metrics: Metrics,
    pub cache: Arc<dyn Cache>,
    pub fetcher: Arc<dyn Fetcher>,
    pub anim: AnimConfig,
}

impl ServerState {
    pub fn new(config: Config, cache: Arc<dyn Cache>, fetcher: Arc<dyn Fetcher>) -> Self {
        let anim = AnimConfig {
            max_frames: config.transform.max_frames,
            max_animated_pixels: config.transform.max_animated_pixels,
            max_pixels: config.transform.max_pixels,
        };
        Self {
            config,
            metrics: Metrics::new(),
            cache,
            fetcher,
            anim,
        }
    }
}

/// Dispatch one routed request to a response
pub async fn dispatch(
    state: &ServerState,
    route: Route,
    if_none_match: Option<&str>,
    accept: Option<&str>,
) -> ServerResponse {
    state.metrics.increment_requests();

    match route {
        Route::Health => ServerResponse::json(200, r#"{"status":"ok"}"#.to_string()),
        Route::Ready => ServerResponse::json(200, r#"{"ready":true}"#.to_string()),
        Route::Metrics => {
            let snapshot = state.metrics.snapshot(state.cache.size().await as u64);
            let body = serde_json::to_string(&snapshot)
                .unwrap_or_else(|_| r#"{"error":"serialization"}"#.to_string());
            ServerResponse::json(200, body)
        }
        Route::Image { path, transform } => {
            handle_image(state, &path, transform.as_deref(), if_none_match, accept).await
        }
        Route::NotFound => ServerResponse::error(&ProxyError::NotFound),
    }
}

/// The image request flow: params → cache → origin → pipeline → cache →
/// respond, with conditional-GET short-circuit
async fn handle_image(
    state: &ServerState,
    path: &str,
    transform: Option<&str>,
    if_none_match: Option<&str>,
    accept: Option<&str>,
) -> ServerResponse {
    let raw_transform = transform.unwrap_or("");

    let params = match TransformParams::parse(raw_transform) {
        Ok(params) => params,
        Err(err) => {
            tracing::debug!(path, transform = raw_transform, error = %err, "transform parse failed");
            return ServerResponse::error(&ProxyError::BadRequest {
                detail: "invalid transform parameters".to_string(),
            });
        }
    };
    if let Err(err) = params.validate() {
        tracing::debug!(path, transform = raw_transform, error = %err, "transform validation failed");
        return ServerResponse::error(&ProxyError::Unprocessable {
            detail: "transform parameters out of range".to_string(),
        });
    }

    // Server-side limits narrow the declared ranges
    let limits = &state.config.transform;
    let over_limit = params.width.map_or(false, |w| w > limits.max_width)
        || params.height.map_or(false, |h| h > limits.max_height);
    if over_limit {
        return ServerResponse::error(&ProxyError::Unprocessable {
            detail: "transform parameters out of range".to_string(),
        });
    }
    let mut params = params;
    if params.quality.is_none() {
        params.quality = Some(limits.default_quality as u32);
    }

    // Account-prefixed URLs: strip the configured prefix before the origin
    // lookup
    let origin_path = match &state.config.origin.path_prefix {
        Some(prefix) => path
            .strip_prefix(prefix.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(path),
        None => path,
    };

    let format_tag = match params.format {
        OutputFormat::Auto => "auto",
        explicit => explicit.as_str(),
    };
    let key = CacheKey::new(origin_path, raw_transform, format_tag);

    if let Some(entry) = state.cache.get(&key).await {
        state.metrics.increment_cache_hits();
        return entry_response(state, entry, if_none_match);
    }
    state.metrics.increment_cache_misses();

    let fetched = match state.fetcher.fetch(origin_path).await {
        Ok(fetched) => fetched,
        Err(err) => {
            tracing::warn!(path = origin_path, error = %err, "origin fetch failed");
            return ServerResponse::error(&map_fetch_error(err));
        }
    };

    let (body, content_type) =
        match imaging::transform(&fetched.bytes, &params, accept, &state.anim) {
            Ok(output) => (Bytes::from(output.data), output.content_type.to_string()),
            Err(err) => {
                // A codec hiccup never becomes a 5xx: serve the original
                log_pipeline_error(origin_path, &err);
                let content_type = sniff_content_type(&fetched.bytes).to_string();
                (fetched.bytes.clone(), content_type)
            }
        };
    drop(fetched);

    state
        .cache
        .put(key.clone(), CacheEntry::new(body.clone(), content_type.clone()))
        .await;

    // Re-read through the cache so hits and misses build responses the same
    // way; a backend that skipped the entry falls back to the owned body.
    match state.cache.get(&key).await {
        Some(entry) => entry_response(state, entry, if_none_match),
        None => {
            let entry = CacheEntry::new(body, content_type);
            entry_response(state, entry, if_none_match)
        }
    }
}

fn entry_response(
    state: &ServerState,
    entry: CacheEntry,
    if_none_match: Option<&str>,
) -> ServerResponse {
    let etag = compute_etag(&entry.data);
    if let Some(header) = if_none_match {
        if if_none_match_matches(header, &etag) {
            return ServerResponse::not_modified(etag);
        }
    }
    ServerResponse::image(
        entry.data,
        entry.content_type,
        state.config.cache.default_ttl_seconds,
    )
}

fn map_fetch_error(err: FetchError) -> ProxyError {
    match err {
        FetchError::NotFound | FetchError::InvalidPath(_) => ProxyError::NotFound,
        FetchError::Timeout => ProxyError::GatewayTimeout,
        FetchError::ResponseTooLarge { .. } => ProxyError::PayloadTooLarge,
        FetchError::ServerError { status } => ProxyError::BadGateway {
            detail: format!("origin returned status {}", status),
        },
        FetchError::ClientError { status } => ProxyError::BadGateway {
            detail: format!("origin rejected request with status {}", status),
        },
        FetchError::ConnectionFailed(msg) => ProxyError::BadGateway { detail: msg },
    }
}

fn log_pipeline_error(path: &str, err: &ImageError) {
    tracing::warn!(path, error = %err, "pipeline failed, serving original bytes");
}
