// Error types module

use std::fmt;

/// Centralized error type for request handling
///
/// Categorizes failures for HTTP status mapping and consistent JSON error
/// bodies. Subsystem errors (parameter parsing, origin fetches, pipeline
/// operations, cache backends) are converted into one of these variants at
/// the dispatch boundary.
#[derive(Debug, Clone)]
pub enum ProxyError {
    /// Transform string failed to parse (400)
    BadRequest { detail: String },
    /// Parameters parsed but fell outside their declared ranges (422)
    Unprocessable { detail: String },
    /// Origin object does not exist, or the path failed sanitisation (404)
    NotFound,
    /// Origin response exceeded the configured size limit (413)
    PayloadTooLarge,
    /// Origin fetch failed for an upstream reason (502)
    BadGateway { detail: String },
    /// Origin fetch timed out (504)
    GatewayTimeout,
    /// Unexpected internal failure (500)
    Internal { detail: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::BadRequest { detail } => write!(f, "bad request: {}", detail),
            ProxyError::Unprocessable { detail } => write!(f, "unprocessable: {}", detail),
            ProxyError::NotFound => write!(f, "not found"),
            ProxyError::PayloadTooLarge => write!(f, "payload too large"),
            ProxyError::BadGateway { detail } => write!(f, "bad gateway: {}", detail),
            ProxyError::GatewayTimeout => write!(f, "gateway timeout"),
            ProxyError::Internal { detail } => write!(f, "internal error: {}", detail),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::BadRequest { .. } => 400,
            ProxyError::Unprocessable { .. } => 422,
            ProxyError::NotFound => 404,
            ProxyError::PayloadTooLarge => 413,
            ProxyError::BadGateway { .. } => 502,
            ProxyError::GatewayTimeout => 504,
            ProxyError::Internal { .. } => 500,
        }
    }

    /// Reason phrase used in the JSON error body
    pub fn message(&self) -> &'static str {
        match self {
            ProxyError::BadRequest { .. } => "Bad Request",
            ProxyError::Unprocessable { .. } => "Unprocessable Entity",
            ProxyError::NotFound => "Not Found",
            ProxyError::PayloadTooLarge => "Payload Too Large",
            ProxyError::BadGateway { .. } => "Bad Gateway",
            ProxyError::GatewayTimeout => "Gateway Timeout",
            ProxyError::Internal { .. } => "Internal Server Error",
        }
    }

    /// Optional detail string carried into the JSON error body
    pub fn detail(&self) -> Option<&str> {
        match self {
            ProxyError::BadRequest { detail }
            | ProxyError::Unprocessable { detail }
            | ProxyError::BadGateway { detail }
            | ProxyError::Internal { detail } => Some(detail),
            _ => None,
        }
    }

    /// Serialize to the JSON error body:
    /// `{"error":{"status":<n>,"message":<phrase>[,"detail":<str>]}}`
    pub fn to_json_body(&self) -> String {
        let mut error = serde_json::json!({
            "status": self.status(),
            "message": self.message(),
        });
        if let Some(detail) = self.detail() {
            error["detail"] = serde_json::Value::String(detail.to_string());
        }
        serde_json::json!({ "error": error }).to_string()
    }
}
