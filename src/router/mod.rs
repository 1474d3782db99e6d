//! Request routing
//!
//! Routes a request path to a well-known endpoint or an image request.
//! The last path segment is treated as a transform string iff it contains
//! `=`. Anything that fails the traversal sanitiser is routed to NotFound
//! before it can reach an origin.

/// Parsed route for a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Ready,
    Metrics,
    Image {
        /// Origin path, leading slash stripped, duplicate slashes collapsed
        path: String,
        /// Raw transform string from the final path segment
        transform: Option<String>,
    },
    NotFound,
}

/// Check a path against traversal and encoding tricks. Rejects `..`,
/// percent-encoded dots/slashes/NUL in any case, raw NUL bytes, and paths
/// starting with `//`.
pub fn is_safe_path(path: &str) -> bool {
    if path.starts_with("//") {
        return false;
    }
    if path.contains('\0') || path.contains("..") {
        return false;
    }
    let lower = path.to_lowercase();
    if lower.contains("%2e") || lower.contains("%2f") || lower.contains("%00") {
        return false;
    }
    true
}

/// Collapse runs of `/` into one
fn normalize_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut prev_was_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !prev_was_slash {
                result.push(ch);
            }
            prev_was_slash = true;
        } else {
            result.push(ch);
            prev_was_slash = false;
        }
    }
    result
}

/// Route a request path
pub fn route(path: &str) -> Route {
    match path {
        "/health" => return Route::Health,
        "/ready" => return Route::Ready,
        "/metrics" => return Route::Metrics,
        _ => {}
    }

    if !is_safe_path(path) {
        return Route::NotFound;
    }

    let normalized = normalize_path(path);
    let trimmed = normalized.trim_matches('/');
    if trimmed.is_empty() {
        return Route::NotFound;
    }

    // The final segment is a transform string iff it carries '='
    match trimmed.rsplit_once('/') {
        Some((image_path, last)) if last.contains('=') => {
            if image_path.is_empty() {
                return Route::NotFound;
            }
            Route::Image {
                path: image_path.to_string(),
                transform: Some(last.to_string()),
            }
        }
        _ if trimmed.contains('=') => {
            // A lone transform segment has no image path to apply it to
            Route::NotFound
        }
        _ => Route::Image {
            path: trimmed.to_string(),
            transform: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_endpoints() {
        assert_eq!(route("/health"), Route::Health);
        assert_eq!(route("/ready"), Route::Ready);
        assert_eq!(route("/metrics"), Route::Metrics);
    }

    #[test]
    fn test_plain_image_path() {
        assert_eq!(
            route("/photos/cat.png"),
            Route::Image {
                path: "photos/cat.png".to_string(),
                transform: None,
            }
        );
    }

    #[test]
    fn test_transform_segment_detected_by_equals() {
        assert_eq!(
            route("/photos/cat.png/w=64,h=64"),
            Route::Image {
                path: "photos/cat.png".to_string(),
                transform: Some("w=64,h=64".to_string()),
            }
        );
    }

    #[test]
    fn test_last_segment_without_equals_is_path() {
        assert_eq!(
            route("/photos/cat.png/thumbnail"),
            Route::Image {
                path: "photos/cat.png/thumbnail".to_string(),
                transform: None,
            }
        );
    }

    #[test]
    fn test_duplicate_slashes_collapsed() {
        assert_eq!(
            route("/photos///cat.png"),
            Route::Image {
                path: "photos/cat.png".to_string(),
                transform: None,
            }
        );
    }

    #[test]
    fn test_root_is_not_found() {
        assert_eq!(route("/"), Route::NotFound);
        assert_eq!(route(""), Route::NotFound);
    }

    #[test]
    fn test_lone_transform_is_not_found() {
        assert_eq!(route("/w=64"), Route::NotFound);
    }

    #[test]
    fn test_sanitiser_rejects_traversal() {
        for bad in [
            "/a/../b.png",
            "/..",
            "/a/%2e%2e/b.png",
            "/a/%2E%2E/b.png",
            "/a%2fb.png",
            "/a%2Fb.png",
            "/a%00.png",
            "/a\0.png",
            "//etc/passwd",
        ] {
            assert!(!is_safe_path(bad), "should reject {:?}", bad);
            assert_eq!(route(bad), Route::NotFound, "should not route {:?}", bad);
        }
    }

    #[test]
    fn test_sanitiser_accepts_ordinary_paths() {
        for good in ["/a/b/c.png", "/cat.gif", "/deep/nested/path/img.webp/w=1"] {
            assert!(is_safe_path(good), "should accept {:?}", good);
        }
    }
}
