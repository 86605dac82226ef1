//! Error types for background removal and the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy at the boundary between the server and the removal model
///
/// The HTTP layer collapses every processing failure into a single
/// "processing failed" response; the variants exist so callers, logs and
/// tests can tell the failure modes apart.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input/output errors (temp file creation, writes, permission denied)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Uploaded bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Result image could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model download failures
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed multipart request
    #[error("Invalid upload: {0}")]
    Upload(String),

    /// Request did not carry the expected file field
    #[error("Missing upload: {0}")]
    MissingUpload(String),

    /// Request body exceeded the configured maximum
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new upload error
    pub fn upload<S: Into<String>>(msg: S) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error with the underlying cause
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create image decoding error with format context
    pub fn image_load_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::Decode(format!(
            "unsupported or corrupt image data (suffix: {}): {}",
            extension, error
        ))
    }

    /// HTTP status reported for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::MissingUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for BgRemovalError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::Upload(err.body_text())
        }
    }
}

impl From<axum::extract::multipart::MultipartRejection> for BgRemovalError {
    fn from(rejection: axum::extract::multipart::MultipartRejection) -> Self {
        Self::Upload(rejection.body_text())
    }
}

impl IntoResponse for BgRemovalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Background removal failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Rejected upload");
        }

        let body = Json(json!({
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}
