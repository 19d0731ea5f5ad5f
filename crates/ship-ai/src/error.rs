//! Error types for ship-ai

use thiserror::Error;

/// Result type alias using ship-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the completion API
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid or missing API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the supplied API key is unusable.
    ///
    /// The gate treats these as a user-actionable key prompt rather than a
    /// generic failure.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Auth(_) | Error::InvalidApiKey => true,
            Error::Api { error_type, .. } => {
                let et = error_type.to_lowercase();
                et.contains("authentication") || et.contains("permission")
            }
            _ => false,
        }
    }
}
