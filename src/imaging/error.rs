//! Imaging error types
//!
//! Structured errors for parameter handling and pipeline operations.
//! Whether a failure maps to 400 (parse) or 422 (validate) is decided by
//! the dispatch boundary based on which call produced it.

use std::fmt;

/// Errors produced by parameter parsing/validation and the transform pipeline
#[derive(Debug, Clone)]
pub enum ImageError {
    // === Parameter errors ===
    /// Unknown transform key
    InvalidParameter { param: String },
    /// Key present but value empty
    EmptyValue { param: String },
    /// Field failed to parse or violated its declared range
    InvalidField {
        field: &'static str,
        message: String,
    },

    // === Pipeline errors ===
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Encoding to the output format failed
    EncodeFailed { format: String, message: String },
    /// A codec primitive failed mid-pipeline
    OperationFailed {
        operation: &'static str,
        message: String,
    },
    /// A fit mode that requires dimensions received none
    NoResizeDimensions,
    /// Source exceeds the configured pixel budget
    TooManyPixels { pixels: u64, max_pixels: u64 },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::InvalidParameter { param } => {
                write!(f, "unknown transform parameter '{}'", param)
            }
            ImageError::EmptyValue { param } => {
                write!(f, "empty value for transform parameter '{}'", param)
            }
            ImageError::InvalidField { field, message } => {
                write!(f, "invalid {}: {}", field, message)
            }
            ImageError::DecodeFailed { message } => {
                write!(f, "failed to decode image: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "failed to encode to {}: {}", format, message)
            }
            ImageError::OperationFailed { operation, message } => {
                write!(f, "{} failed: {}", operation, message)
            }
            ImageError::NoResizeDimensions => {
                write!(f, "resize requires at least one dimension")
            }
            ImageError::TooManyPixels { pixels, max_pixels } => {
                write!(f, "source has {} pixels, limit is {}", pixels, max_pixels)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        ImageError::InvalidField {
            field,
            message: message.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn operation_failed(operation: &'static str, message: impl Into<String>) -> Self {
        ImageError::OperationFailed {
            operation,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = ImageError::InvalidParameter {
            param: "banana".to_string(),
        };
        assert_eq!(err.to_string(), "unknown transform parameter 'banana'");
    }

    #[test]
    fn test_invalid_field_display() {
        let err = ImageError::invalid_field("width", "must be 1-8192");
        assert_eq!(err.to_string(), "invalid width: must be 1-8192");
    }

    #[test]
    fn test_operation_failed_display() {
        let err = ImageError::operation_failed("resize", "zero dimension");
        assert_eq!(err.to_string(), "resize failed: zero dimension");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ImageError>();
    }
}
