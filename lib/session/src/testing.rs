//! Test doubles shared by the module tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::codec::{ClaimSet, Credential, encode_unsigned};
use crate::error::RefreshFailure;
use crate::refresh::RefreshClient;
use crate::role::Role;

/// Builds an unsigned credential for `roles` expiring at `expiry`.
pub(crate) fn credential_for(roles: &[&str], expiry: DateTime<Utc>) -> Credential {
    let claims = ClaimSet::new(
        "subject-1",
        "tester@example.com",
        roles.iter().map(|r| Role::new(*r)).collect(),
        expiry,
    );
    encode_unsigned(&claims)
}

/// Refresh client answering from a queue of scripted outcomes.
#[derive(Default)]
pub(crate) struct ScriptedRefreshClient {
    outcomes: Mutex<VecDeque<Result<Credential, RefreshFailure>>>,
    seen: Mutex<Vec<Option<Credential>>>,
    calls: AtomicUsize,
    release: Option<Arc<Notify>>,
}

impl ScriptedRefreshClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A client whose calls block until the returned `Notify` is signalled.
    pub(crate) fn gated() -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let client = Self {
            release: Some(Arc::clone(&release)),
            ..Self::default()
        };
        (client, release)
    }

    pub(crate) fn push_ok(&self, credential: Credential) {
        self.outcomes.lock().push_back(Ok(credential));
    }

    pub(crate) fn push_err(&self, failure: RefreshFailure) {
        self.outcomes.lock().push_back(Err(failure));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<Option<Credential>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl RefreshClient for ScriptedRefreshClient {
    async fn refresh(&self, current: Option<&Credential>) -> Result<Credential, RefreshFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(current.cloned());
        if let Some(release) = &self.release {
            release.notified().await;
        }
        let next = self.outcomes.lock().pop_front();
        next.unwrap_or_else(|| {
            Err(RefreshFailure::Unreachable {
                reason: "no scripted outcome".to_string(),
            })
        })
    }
}

/// Clock that follows tokio's (pausable) time, anchored at a whole second.
#[derive(Debug)]
pub(crate) struct TokioClock {
    anchor_utc: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            anchor_utc: DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now),
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.anchor;
        self.anchor_utc + TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero())
    }
}
