//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when communicating with the sql-insight backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a business error code in the response envelope.
    #[error("api error ({code}): {message}")]
    Api { code: i64, message: String },

    /// Credentials are missing or no longer valid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Response did not match the expected envelope shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
