//! The single-writer session store.
//!
//! State changes are published through a `tokio::sync::watch` channel as
//! whole [`SessionState`] snapshots, so a reader either sees the state before
//! a login/logout or the state after it, never a mix of the two.
//!
//! Every login or logout bumps a session generation. A refresh records the
//! generation it started against and drops its outcome if that generation
//! has moved on by the time the round trip answers.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, ClaimSet, Credential};
use crate::error::{DecodeError, LoginError, RefreshFailure};
use crate::refresh::RefreshClient;
use crate::role::{PrimaryRolePolicy, Role};
use crate::storage::CredentialStorage;

type RefreshFuture = BoxFuture<'static, Result<Credential, RefreshFailure>>;

/// A pending refresh and the generation it was started against.
///
/// Held weakly: once every caller stops awaiting, the round trip is dropped
/// and the next caller starts a new one.
struct InFlight {
    generation: u64,
    refresh: WeakShared<RefreshFuture>,
}

impl InFlight {
    fn join(&self, generation: u64) -> Option<Shared<RefreshFuture>> {
        if self.generation == generation {
            self.refresh.upgrade()
        } else {
            None
        }
    }
}

/// A decoded, accepted credential and the role the session acts under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    credential: Credential,
    claims: ClaimSet,
    role: Role,
}

/// Snapshot of the session as observed by readers.
///
/// A role is present exactly when a credential is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    active: Option<ActiveSession>,
    initialized: bool,
}

impl SessionState {
    /// State before the first login, logout, or restore has resolved.
    #[must_use]
    pub fn bootstrapping() -> Self {
        Self::default()
    }

    fn signed_out() -> Self {
        Self {
            active: None,
            initialized: true,
        }
    }

    fn signed_in(credential: Credential, claims: ClaimSet, role: Role) -> Self {
        Self {
            active: Some(ActiveSession {
                credential,
                claims,
                role,
            }),
            initialized: true,
        }
    }

    /// Returns the current credential.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.active.as_ref().map(|a| &a.credential)
    }

    /// Returns the claims of the current credential.
    #[must_use]
    pub fn claims(&self) -> Option<&ClaimSet> {
        self.active.as_ref().map(|a| &a.claims)
    }

    /// Returns the primary role.
    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.active.as_ref().map(|a| &a.role)
    }

    /// Returns true once a login, logout, or restore has resolved.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns true if a credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }
}

/// Builder for `SessionStore`.
pub struct SessionStoreBuilder {
    storage: Arc<dyn CredentialStorage>,
    refresher: Arc<dyn RefreshClient>,
    clock: Arc<dyn Clock>,
    policy: PrimaryRolePolicy,
}

impl SessionStoreBuilder {
    /// Sets the clock used for expiry checks.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the primary-role selection policy.
    #[must_use]
    pub fn policy(mut self, policy: PrimaryRolePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds an empty store in the bootstrapping state.
    ///
    /// Call [`SessionStore::restore`] to seed it from storage.
    #[must_use]
    pub fn build(self) -> SessionStore {
        let (state, _) = watch::channel(SessionState::bootstrapping());
        SessionStore {
            inner: Arc::new(StoreInner {
                state,
                storage: self.storage,
                refresher: self.refresher,
                clock: self.clock,
                policy: self.policy,
                generation: Mutex::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }
}

/// Holder of the current credential and derived role.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<SessionState>,
    storage: Arc<dyn CredentialStorage>,
    refresher: Arc<dyn RefreshClient>,
    clock: Arc<dyn Clock>,
    policy: PrimaryRolePolicy,
    /// Bumped by every login and logout. Held while the session is written.
    generation: Mutex<u64>,
    in_flight: Mutex<Option<InFlight>>,
}

impl SessionStore {
    /// Starts building a store over `storage` and `refresher`.
    #[must_use]
    pub fn builder(
        storage: Arc<dyn CredentialStorage>,
        refresher: Arc<dyn RefreshClient>,
    ) -> SessionStoreBuilder {
        SessionStoreBuilder {
            storage,
            refresher,
            clock: Arc::new(SystemClock),
            policy: PrimaryRolePolicy::default(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Returns the clock this store judges expiry with.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// Returns true while a refresh round trip is pending.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .as_ref()
            .is_some_and(|pending| pending.refresh.upgrade().is_some())
    }

    /// Seeds the store from persistent storage.
    ///
    /// A stored credential goes through [`login`](Self::login). With nothing
    /// stored the store stays bootstrapping until a refresh resolves.
    pub fn restore(&self) -> SessionState {
        match self.inner.storage.get() {
            Ok(Some(raw)) => {
                debug!("restoring stored credential");
                if let Err(e) = self.inner.login(Credential::new(raw)) {
                    debug!(error = %e, "stored credential not restored");
                }
            }
            Ok(None) => debug!("no stored credential"),
            Err(e) => warn!(error = %e, "failed to read stored credential"),
        }
        self.snapshot()
    }

    /// Accepts a credential and publishes the derived role.
    ///
    /// # Errors
    ///
    /// Returns a [`LoginError`] if the credential does not decode or has
    /// already expired. The store is logged out in that case.
    pub fn login(&self, credential: Credential) -> Result<Role, LoginError> {
        self.inner.login(credential)
    }

    /// Clears the credential from memory and storage.
    pub fn logout(&self) {
        self.inner.logout();
    }

    /// Renews the credential, returning the new one or `None` on failure.
    ///
    /// See [`try_refresh`](Self::try_refresh).
    pub async fn refresh(&self) -> Option<Credential> {
        self.try_refresh().await.ok()
    }

    /// Renews the credential through the refresh client.
    ///
    /// Success logs in with the new credential, failure logs out. Callers
    /// arriving while a refresh is pending share its single round trip and
    /// observe the same result.
    ///
    /// A login or logout made while the round trip is pending wins: the
    /// refresh outcome is discarded and the store is left as that call set it.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshFailure`] that forced the logout, or
    /// [`RefreshFailure::Superseded`] if the outcome was discarded.
    pub async fn try_refresh(&self) -> Result<Credential, RefreshFailure> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            let (current, generation) = self.inner.current();
            match in_flight.as_ref().and_then(|pending| pending.join(generation)) {
                Some(pending) => {
                    debug!("joining in-flight credential refresh");
                    pending
                }
                None => {
                    let pending = Arc::clone(&self.inner)
                        .run_refresh(current, generation)
                        .boxed()
                        .shared();
                    *in_flight = pending
                        .downgrade()
                        .map(|refresh| InFlight { generation, refresh });
                    pending
                }
            }
        };
        pending.await
    }
}

impl StoreInner {
    /// Returns the current credential with its generation.
    fn current(&self) -> (Option<Credential>, u64) {
        let generation = self.generation.lock();
        (self.state.borrow().credential().cloned(), *generation)
    }

    fn login(&self, credential: Credential) -> Result<Role, LoginError> {
        let mut generation = self.generation.lock();
        self.accept(&mut generation, credential)
    }

    fn logout(&self) {
        let mut generation = self.generation.lock();
        self.clear(&mut generation);
    }

    fn accept(&self, generation: &mut u64, credential: Credential) -> Result<Role, LoginError> {
        let claims = match codec::decode(&credential) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "rejecting undecodable credential");
                self.clear(generation);
                return Err(e.into());
            }
        };

        if codec::is_expired(&claims, self.clock.now()) {
            warn!(
                subject_id = %claims.subject_id(),
                expired_at = %claims.expiry(),
                "rejecting expired credential"
            );
            self.clear(generation);
            return Err(LoginError::Expired {
                expired_at: claims.expiry(),
            });
        }

        let Some(role) = self.policy.select(claims.roles()).cloned() else {
            self.clear(generation);
            return Err(DecodeError::NoRoles.into());
        };

        if let Err(e) = self.storage.set(credential.as_str()) {
            warn!(error = %e, "failed to persist credential");
        }

        info!(
            subject_id = %claims.subject_id(),
            role = %role,
            expires_at = %claims.expiry(),
            "session established"
        );
        *generation += 1;
        self.state
            .send_replace(SessionState::signed_in(credential, claims, role.clone()));
        Ok(role)
    }

    fn clear(&self, generation: &mut u64) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear stored credential");
        }
        *generation += 1;
        let previous = self.state.send_replace(SessionState::signed_out());
        if let Some(claims) = previous.claims() {
            info!(subject_id = %claims.subject_id(), "session ended");
        }
    }

    async fn run_refresh(
        self: Arc<Self>,
        current: Option<Credential>,
        started: u64,
    ) -> Result<Credential, RefreshFailure> {
        debug!(has_credential = current.is_some(), "refreshing credential");
        let outcome = self.refresher.refresh(current.as_ref()).await;
        self.release(started);

        let mut generation = self.generation.lock();
        if *generation != started {
            debug!("session changed during refresh, discarding outcome");
            return Err(RefreshFailure::Superseded);
        }
        match outcome {
            Ok(credential) => {
                self.accept(&mut generation, credential.clone())?;
                Ok(credential)
            }
            Err(failure) => {
                warn!(error = %failure, "credential refresh failed, signing out");
                self.clear(&mut generation);
                Err(failure)
            }
        }
    }

    /// Empties the in-flight slot if it still belongs to `started`.
    fn release(&self, started: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .as_ref()
            .is_some_and(|pending| pending.generation == started)
        {
            *in_flight = None;
        }
    }
}
