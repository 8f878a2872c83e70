//! Error types for the streaming query client.
//!
//! Only diagnostics see these; the presentation layer gets a fixed message
//! through [`crate::ResponseState::error`].

use thiserror::Error;

/// A result type using `TransportError`.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A query was rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query was empty or contained only whitespace.
    #[error("query is empty")]
    Empty,
}

/// Errors raised while opening or reading the answer stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint answered with something other than `200 OK`.
    #[error("unexpected status {status}")]
    Status {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },

    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body failed mid-stream.
    #[error("stream error: {0}")]
    Body(String),

    /// The HTTP client could not be configured.
    #[error("invalid client configuration: {0}")]
    Client(String),
}

impl TransportError {
    /// Returns the HTTP status when the failure was a non-200 response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}
