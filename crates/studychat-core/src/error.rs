//! Error types for talking to the backend.

use thiserror::Error;

/// Everything that can go wrong between the client and the backend.
///
/// The session core treats every variant the same way (a failed request);
/// the distinction only matters for logging and for the message shown next
/// to a retry action.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base URL from the configuration could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local file for upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Upload rejected before any request was made.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

impl ApiError {
    /// True when retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
