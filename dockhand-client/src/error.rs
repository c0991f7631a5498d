//! Error types for the Dockhand clients

use dockhand_core::CoreError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the container engine or the CI server
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Endpoint URL cannot be used with the requested transport
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// TLS material could not be loaded or parsed
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The engine reported a failure inside a progress stream
    #[error("Engine reported: {0}")]
    Stream(String),

    /// A progress stream ended before it was fully transferred
    #[error("Incomplete transfer: {0}")]
    IncompleteStream(String),

    /// Registry credential could not be encoded
    #[error(transparent)]
    Auth(#[from] CoreError),

    /// Job definition could not be rendered
    #[error("Failed to render job definition: {0}")]
    Template(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a conflict (e.g. container name already in use)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ApiError { status: 409, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}
