//! Error types for the session crate.
//!
//! - `DecodeError`: Credential structure or claim failures
//! - `LoginError`: Credentials the store refused to accept
//! - `RefreshFailure`: Renewal endpoint rejected or was unreachable
//! - `StorageError`: Persistent credential slot failures
//!
//! All of these are absorbed into session state transitions by the store.
//! They are returned only to the action that initiated the operation.

use chrono::{DateTime, Utc};
use std::fmt;

/// Errors from decoding a bearer credential into a claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Credential does not have three dot-separated segments.
    Malformed { segments: usize },
    /// A segment is not valid base64url or not a JSON object.
    InvalidSegment { segment: &'static str, reason: String },
    /// A claim is present but has the wrong shape.
    InvalidClaims { claim: &'static str, reason: String },
    /// A required claim is absent.
    MissingClaim { claim: &'static str },
    /// The role claim is an empty sequence.
    NoRoles,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { segments } => {
                write!(f, "malformed credential: expected 3 segments, found {segments}")
            }
            Self::InvalidSegment { segment, reason } => {
                write!(f, "invalid credential {segment} segment: {reason}")
            }
            Self::InvalidClaims { claim, reason } => {
                write!(f, "invalid claim '{claim}': {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::NoRoles => write!(f, "credential carries no roles"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Reasons the session store refused a credential at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Credential could not be decoded.
    Invalid(DecodeError),
    /// Credential decoded but its expiry is not in the future.
    Expired { expired_at: DateTime<Utc> },
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "credential rejected: {e}"),
            Self::Expired { expired_at } => {
                write!(f, "credential expired at {}", expired_at.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid(e) => Some(e),
            Self::Expired { .. } => None,
        }
    }
}

impl From<DecodeError> for LoginError {
    fn from(e: DecodeError) -> Self {
        Self::Invalid(e)
    }
}

/// Errors from the credential renewal endpoint.
///
/// Not retried automatically; the store logs out on any of these except
/// [`Superseded`](RefreshFailure::Superseded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Endpoint answered with a non-success status.
    Rejected { status: u16 },
    /// Endpoint could not be reached.
    Unreachable { reason: String },
    /// Endpoint answered but the new credential was not accepted.
    InvalidCredential { reason: String },
    /// A login or logout replaced the session while the refresh was
    /// pending; its outcome was discarded.
    Superseded,
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status } => {
                write!(f, "credential refresh rejected with status {status}")
            }
            Self::Unreachable { reason } => {
                write!(f, "credential refresh endpoint unreachable: {reason}")
            }
            Self::InvalidCredential { reason } => {
                write!(f, "refreshed credential is invalid: {reason}")
            }
            Self::Superseded => write!(f, "session changed while the refresh was pending"),
        }
    }
}

impl std::error::Error for RefreshFailure {}

impl From<LoginError> for RefreshFailure {
    fn from(e: LoginError) -> Self {
        Self::InvalidCredential {
            reason: e.to_string(),
        }
    }
}

/// Errors from the persistent credential slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Reading the slot failed.
    ReadFailed { reason: String },
    /// Writing the slot failed.
    WriteFailed { reason: String },
    /// Clearing the slot failed.
    ClearFailed { reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { reason } => write!(f, "credential storage read failed: {reason}"),
            Self::WriteFailed { reason } => {
                write!(f, "credential storage write failed: {reason}")
            }
            Self::ClearFailed { reason } => {
                write!(f, "credential storage clear failed: {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_malformed_display() {
        let err = DecodeError::Malformed { segments: 2 };
        assert!(err.to_string().contains("3 segments"));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn decode_error_missing_claim_display() {
        let err = DecodeError::MissingClaim { claim: "exp" };
        assert!(err.to_string().contains("missing required claim"));
        assert!(err.to_string().contains("exp"));
    }

    #[test]
    fn login_error_wraps_decode_error() {
        let err: LoginError = DecodeError::NoRoles.into();
        assert_eq!(err, LoginError::Invalid(DecodeError::NoRoles));
        assert!(err.to_string().contains("no roles"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn refresh_failure_from_login_error() {
        let failure = RefreshFailure::from(LoginError::Invalid(DecodeError::NoRoles));
        match failure {
            RefreshFailure::InvalidCredential { reason } => {
                assert!(reason.contains("no roles"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn refresh_failure_rejected_display() {
        let err = RefreshFailure::Rejected { status: 403 };
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn refresh_failure_superseded_display() {
        assert!(
            RefreshFailure::Superseded
                .to_string()
                .contains("session changed")
        );
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::WriteFailed {
            reason: "read-only filesystem".to_string(),
        };
        assert!(err.to_string().contains("write failed"));
        assert!(err.to_string().contains("read-only filesystem"));
    }
}
