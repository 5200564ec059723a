//! Error types for the cloud provider boundary.

use lbsync_core::IdError;
use thiserror::Error;

/// A result type using `CloudError`.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Errors returned by a cloud provider.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the provider's error body.
        message: String,
    },

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The response carried an unusable identifier.
    #[error("invalid identifier in response: {0}")]
    InvalidId(#[from] IdError),

    /// The client is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),

    /// A failure injected by the in-memory provider.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl CloudError {
    /// Returns true if a later attempt might succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Injected(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 409 || *status == 429,
            Self::NotFound(_) | Self::Parse(_) | Self::InvalidId(_) | Self::Config(_) => false,
        }
    }

    /// Returns true if the provider reported a missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
