//! Watermark error types
//!
//! Every failure in the command pipeline maps to one variant here. Decode
//! errors abort before any engine call; engine-sourced variants chain the
//! underlying [`EngineError`](crate::engine::EngineError).

use crate::engine::EngineError;
use thiserror::Error;

/// Errors that can occur while decoding or applying a watermark command
#[derive(Error, Debug)]
pub enum WatermarkError {
    // === Parameter Errors ===
    /// Token did not split into exactly `key_value`
    #[error("malformed watermark token '{token}': expected key_value")]
    MalformedToken { token: String },

    /// Numeric parameter value failed to parse
    #[error("invalid numeric value '{value}' for parameter '{key}'")]
    InvalidNumericValue { key: &'static str, value: String },

    /// Base64url parameter value failed to decode
    #[error("invalid encoded value for parameter '{key}': {reason}")]
    InvalidEncodedString { key: &'static str, reason: String },

    /// Font color is not a base-16 number
    #[error("invalid color '{value}': expected hex digits")]
    InvalidColor { value: String },

    // === Engine Errors ===
    /// Overlay image could not be loaded
    #[error("failed to load overlay '{path}': {source}")]
    OverlayLoadFailed {
        path: String,
        #[source]
        source: EngineError,
    },

    /// Overlay resize failed
    #[error("failed to resize overlay by factor {scale}: {source}")]
    OverlayResizeFailed {
        scale: f64,
        #[source]
        source: EngineError,
    },

    /// Composite onto the background failed
    #[error("composite failed: {source}")]
    CompositeFailed {
        #[source]
        source: EngineError,
    },

    /// Text label render failed
    #[error("label render failed: {source}")]
    LabelRenderFailed {
        #[source]
        source: EngineError,
    },
}

impl WatermarkError {
    /// Helper constructors for common error patterns
    pub fn malformed_token(token: impl Into<String>) -> Self {
        WatermarkError::MalformedToken {
            token: token.into(),
        }
    }

    pub fn invalid_numeric(key: &'static str, value: impl Into<String>) -> Self {
        WatermarkError::InvalidNumericValue {
            key,
            value: value.into(),
        }
    }

    pub fn invalid_encoded(key: &'static str, reason: impl Into<String>) -> Self {
        WatermarkError::InvalidEncodedString {
            key,
            reason: reason.into(),
        }
    }

    pub fn invalid_color(value: impl Into<String>) -> Self {
        WatermarkError::InvalidColor {
            value: value.into(),
        }
    }

    pub fn overlay_load_failed(path: impl Into<String>, source: EngineError) -> Self {
        WatermarkError::OverlayLoadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn overlay_resize_failed(scale: f64, source: EngineError) -> Self {
        WatermarkError::OverlayResizeFailed { scale, source }
    }
}
