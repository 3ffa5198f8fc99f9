//! Transport error types.

use allerdex_session::RefreshFailure;
use std::fmt;

/// Failures of a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The request could not be sent or timed out.
    Request { reason: String },
    /// The backend answered with a non-success status.
    Status { status: u16, message: String },
    /// The backend answered 401.
    Unauthorized { message: String },
    /// The response body was not in the expected shape.
    InvalidResponse { reason: String },
}

impl NetworkError {
    /// Returns a message suitable for the initiating form or prompt.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Request { .. } => "the server could not be reached",
            Self::Status { message, .. } | Self::Unauthorized { message } => message,
            Self::InvalidResponse { .. } => "the server returned an unexpected response",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { reason } => write!(f, "request failed: {}", reason),
            Self::Status { status, message } => {
                write!(f, "server returned {}: {}", status, message)
            }
            Self::Unauthorized { message } => write!(f, "unauthorized: {}", message),
            Self::InvalidResponse { reason } => write!(f, "invalid response: {}", reason),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<NetworkError> for RefreshFailure {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Request { reason } => Self::Unreachable { reason },
            NetworkError::Status { status, .. } => Self::Rejected { status },
            NetworkError::Unauthorized { .. } => Self::Rejected { status: 401 },
            NetworkError::InvalidResponse { reason } => Self::InvalidCredential { reason },
        }
    }
}
