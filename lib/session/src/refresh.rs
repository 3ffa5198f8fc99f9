//! Seam to the credential renewal endpoint.

use async_trait::async_trait;

use crate::codec::Credential;
use crate::error::RefreshFailure;

/// Exchanges the current session for a new credential.
///
/// Implementations perform exactly one network round trip per call; the
/// session store collapses concurrent callers before reaching this trait.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Requests a new credential, authorizing with `current` when present.
    async fn refresh(&self, current: Option<&Credential>) -> Result<Credential, RefreshFailure>;
}

/// Refresh client for hosts without a renewal endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRefreshClient;

#[async_trait]
impl RefreshClient for UnavailableRefreshClient {
    async fn refresh(&self, _current: Option<&Credential>) -> Result<Credential, RefreshFailure> {
        Err(RefreshFailure::Unreachable {
            reason: "no renewal endpoint configured".to_string(),
        })
    }
}
