//! Pre-expiry warning and hard-expiry timers.
//!
//! Every [`ExpiryScheduler::arm`] call returns an [`ArmedTimers`] value that
//! owns both one-shot timers; dropping or cancelling it aborts them. The
//! watcher started by [`ExpiryScheduler::start`] re-arms whenever the store's
//! credential changes. Each timer also re-checks on firing that its
//! credential is still current, so a superseded timer can never sign out a
//! freshly refreshed session.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::codec::Credential;
use crate::config::SessionConfig;
use crate::error::RefreshFailure;
use crate::gate::Destination;
use crate::store::{SessionState, SessionStore};

const EVENT_CAPACITY: usize = 16;

/// Notifications for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryEvent {
    /// The credential expires soon; offer extend or logout.
    Warning { expires_at: DateTime<Utc> },
    /// The session was extended from the warning prompt.
    WarningDismissed,
    /// The credential expired and the session was signed out.
    Expired { destination: Destination },
}

/// A one-shot timer task, aborted when cancelled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Runs `action` once `delay` has passed, counted from this call.
    fn after<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = tokio::time::Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            action.await;
        });
        Self { task }
    }

    /// Returns true until the timer has fired or been cancelled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels the timer if it has not fired.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The warning and hard-expiry timers armed for one credential.
#[derive(Debug)]
pub struct ArmedTimers {
    credential: Credential,
    warning_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    warning: TimerHandle,
    expiry: TimerHandle,
}

impl ArmedTimers {
    /// Returns the credential these timers were computed from.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns when the warning fires.
    #[must_use]
    pub fn warning_at(&self) -> DateTime<Utc> {
        self.warning_at
    }

    /// Returns when the hard expiry fires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the warning timer.
    #[must_use]
    pub fn warning(&self) -> &TimerHandle {
        &self.warning
    }

    /// Returns the hard-expiry timer.
    #[must_use]
    pub fn expiry(&self) -> &TimerHandle {
        &self.expiry
    }

    /// Cancels both timers.
    pub fn cancel(self) {
        self.warning.cancel();
        self.expiry.cancel();
    }
}

/// Arms expiry timers from the session store's credential.
#[derive(Clone)]
pub struct ExpiryScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: SessionStore,
    clock: Arc<dyn Clock>,
    warning_offset: TimeDelta,
    events: broadcast::Sender<ExpiryEvent>,
}

impl SchedulerInner {
    fn is_current(&self, credential: &Credential) -> bool {
        self.store.snapshot().credential() == Some(credential)
    }

    fn emit(&self, event: ExpiryEvent) {
        if self.events.send(event).is_err() {
            debug!("no expiry event subscribers");
        }
    }
}

impl ExpiryScheduler {
    /// Creates a scheduler reading the store's clock.
    #[must_use]
    pub fn new(store: SessionStore, config: &SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                clock: store.clock(),
                store,
                warning_offset: config.warning_offset(),
                events,
            }),
        }
    }

    /// Subscribes to expiry events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExpiryEvent> {
        self.inner.events.subscribe()
    }

    /// Arms both timers for the credential in `state`.
    ///
    /// Returns `None` when the state holds no credential. A warning instant
    /// already in the past fires immediately.
    #[must_use]
    pub fn arm(&self, state: &SessionState) -> Option<ArmedTimers> {
        let credential = state.credential()?.clone();
        let expires_at = state.claims()?.expiry();
        let warning_at = expires_at
            .checked_sub_signed(self.inner.warning_offset)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let now = self.inner.clock.now();

        let warning_delay = delay_until(warning_at, now);
        let expiry_delay = delay_until(expires_at, now);
        debug!(
            warning_in_secs = warning_delay.as_secs(),
            expires_in_secs = expiry_delay.as_secs(),
            "arming expiry timers"
        );

        let warning = {
            let inner = Arc::clone(&self.inner);
            let credential = credential.clone();
            TimerHandle::after(warning_delay, async move {
                if inner.is_current(&credential) {
                    debug!(%expires_at, "session expiry warning");
                    inner.emit(ExpiryEvent::Warning { expires_at });
                }
            })
        };

        let expiry = {
            let inner = Arc::clone(&self.inner);
            let credential = credential.clone();
            TimerHandle::after(expiry_delay, async move {
                if !inner.is_current(&credential) {
                    return;
                }
                info!(%expires_at, "credential expired, signing out");
                inner.emit(ExpiryEvent::Expired {
                    destination: Destination::Login,
                });
                inner.store.logout();
            })
        };

        Some(ArmedTimers {
            credential,
            warning_at,
            expires_at,
            warning,
            expiry,
        })
    }

    /// Starts re-arming on every credential change.
    ///
    /// Dropping the returned guard stops the watcher and cancels its timers.
    #[must_use]
    pub fn start(&self) -> SchedulerGuard {
        let scheduler = self.clone();
        let mut rx = self.inner.store.subscribe();

        let watcher = tokio::spawn(async move {
            let mut armed: Option<ArmedTimers> = None;
            loop {
                let state = rx.borrow_and_update().clone();
                if armed.as_ref().map(ArmedTimers::credential) != state.credential() {
                    if let Some(stale) = armed.take() {
                        debug!("cancelling expiry timers for superseded credential");
                        stale.cancel();
                    }
                    armed = scheduler.arm(&state);
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        SchedulerGuard { watcher }
    }

    /// Returns the renew/logout surface for the warning stage.
    #[must_use]
    pub fn prompt(&self) -> ExpiryPrompt {
        ExpiryPrompt {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Keeps the re-arming watcher alive; aborts it on drop.
#[derive(Debug)]
pub struct SchedulerGuard {
    watcher: JoinHandle<()>,
}

impl SchedulerGuard {
    /// Stops the watcher and cancels its timers.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// User actions available once the expiry warning is shown.
#[derive(Clone)]
pub struct ExpiryPrompt {
    inner: Arc<SchedulerInner>,
}

impl ExpiryPrompt {
    /// Extends the session through a refresh.
    ///
    /// On success the warning is dismissed and the new credential re-arms the
    /// timers through the watcher.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshFailure`]; the store has already signed out and
    /// the view should navigate to [`Destination::Login`]. If a logout or
    /// hard expiry landed first the failure is [`RefreshFailure::Superseded`]
    /// and the renewed credential is not applied.
    pub async fn extend(&self) -> Result<Credential, RefreshFailure> {
        let credential = self.inner.store.try_refresh().await?;
        self.inner.emit(ExpiryEvent::WarningDismissed);
        Ok(credential)
    }

    /// Signs out immediately and returns where to navigate.
    pub fn logout(&self) -> Destination {
        self.inner.store.logout();
        Destination::Login
    }
}

fn delay_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{ScriptedRefreshClient, TokioClock, credential_for};
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        store: SessionStore,
        scheduler: ExpiryScheduler,
        refresher: Arc<ScriptedRefreshClient>,
        events: broadcast::Receiver<ExpiryEvent>,
        start: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedRefreshClient::new())
    }

    fn fixture_with(refresher: ScriptedRefreshClient) -> Fixture {
        let clock = Arc::new(TokioClock::new());
        let start = clock.now();
        let refresher = Arc::new(refresher);
        let store = SessionStore::builder(Arc::new(MemoryStorage::new()), refresher.clone())
            .clock(clock)
            .build();
        let scheduler = ExpiryScheduler::new(store.clone(), &SessionConfig::default());
        let events = scheduler.subscribe();
        Fixture {
            store,
            scheduler,
            refresher,
            events,
            start,
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(duration: Duration) {
        tokio::time::advance(duration).await;
        settle().await;
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    #[tokio::test(start_paused = true)]
    async fn timers_fire_at_warning_offset_and_expiry_exactly_once() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(3600)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;

        advance(Duration::from_secs(3299)).await;
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));

        advance(Duration::from_millis(1010)).await;
        assert_eq!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning {
                expires_at: f.start + secs(3600)
            })
        );
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));

        advance(Duration::from_secs(298)).await;
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());

        advance(Duration::from_millis(2010)).await;
        assert_eq!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Expired {
                destination: Destination::Login
            })
        );
        assert!(!f.store.snapshot().is_authenticated());
        assert!(f.store.snapshot().is_initialized());

        advance(Duration::from_secs(7200)).await;
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_rearms_and_stale_expiry_never_fires() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(600)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;

        advance(Duration::from_secs(400)).await;
        assert!(matches!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning { .. })
        ));

        f.refresher
            .push_ok(credential_for(&["ROLE_USER"], f.start + secs(3600)));
        assert!(f.store.refresh().await.is_some());
        settle().await;

        advance(Duration::from_secs(300)).await;
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());

        advance(Duration::from_secs(2610)).await;
        assert_eq!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning {
                expires_at: f.start + secs(3600)
            })
        );
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn warning_in_the_past_fires_immediately() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(60)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;

        assert!(matches!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning { .. })
        ));
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn arm_computes_instants_and_cancel_stops_both_timers() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(3600)))
            .expect("login");

        let armed = f.scheduler.arm(&f.store.snapshot()).expect("armed");
        assert_eq!(armed.expires_at(), f.start + secs(3600));
        assert_eq!(armed.warning_at(), f.start + secs(3300));
        assert!(armed.warning().is_pending());
        assert!(armed.expiry().is_pending());

        armed.cancel();
        advance(Duration::from_secs(4000)).await;

        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_warning_offset_warns_immediately() {
        let f = fixture();
        let scheduler = ExpiryScheduler::new(
            f.store.clone(),
            &SessionConfig {
                warning_offset_seconds: i64::MAX,
                ..SessionConfig::default()
            },
        );
        let mut events = scheduler.subscribe();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(3600)))
            .expect("login");

        let armed = scheduler.arm(&f.store.snapshot()).expect("armed");
        assert_eq!(armed.warning_at(), DateTime::<Utc>::MIN_UTC);
        settle().await;

        assert_eq!(
            events.try_recv(),
            Ok(ExpiryEvent::Warning {
                expires_at: f.start + secs(3600)
            })
        );
        assert!(armed.expiry().is_pending());
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn arm_without_credential_is_none() {
        let f = fixture();
        assert!(f.scheduler.arm(&f.store.snapshot()).is_none());
        f.store.logout();
        assert!(f.scheduler.arm(&f.store.snapshot()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_timer_does_not_sign_out() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(100)))
            .expect("login");
        let stale = f.scheduler.arm(&f.store.snapshot()).expect("armed");

        f.store
            .login(credential_for(&["ROLE_ADMIN"], f.start + secs(5000)))
            .expect("login");
        advance(Duration::from_secs(200)).await;

        assert!(!stale.expiry().is_pending());
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_guard_cancels_timers() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(600)))
            .expect("login");
        let guard = f.scheduler.start();
        settle().await;

        guard.shutdown();
        settle().await;
        advance(Duration::from_secs(1200)).await;

        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn extend_dismisses_warning() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(120)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;
        assert!(matches!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning { .. })
        ));

        let renewed = credential_for(&["ROLE_USER"], f.start + secs(3600));
        f.refresher.push_ok(renewed.clone());
        let extended = f.scheduler.prompt().extend().await;

        assert_eq!(extended, Ok(renewed));
        assert_eq!(f.events.try_recv(), Ok(ExpiryEvent::WarningDismissed));

        advance(Duration::from_secs(200)).await;
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
        assert!(f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn hard_expiry_during_pending_extend_stays_signed_out() {
        let (refresher, release) = ScriptedRefreshClient::gated();
        let mut f = fixture_with(refresher);
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(120)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;
        assert!(matches!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning { .. })
        ));

        f.refresher
            .push_ok(credential_for(&["ROLE_ADMIN"], f.start + secs(3600)));
        let prompt = f.scheduler.prompt();
        let pending = tokio::spawn(async move { prompt.extend().await });
        settle().await;
        assert!(f.store.is_refreshing());

        advance(Duration::from_secs(121)).await;
        assert_eq!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Expired {
                destination: Destination::Login
            })
        );
        assert!(!f.store.snapshot().is_authenticated());

        release.notify_one();
        let extended = pending.await.expect("extend task");
        settle().await;

        assert_eq!(extended, Err(RefreshFailure::Superseded));
        assert_eq!(f.refresher.calls(), 1);
        assert!(!f.store.snapshot().is_authenticated());
        assert!(f.store.snapshot().role().is_none());
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_extend_signs_out() {
        let f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(120)))
            .expect("login");
        f.refresher.push_err(RefreshFailure::Rejected { status: 401 });

        let result = f.scheduler.prompt().extend().await;

        assert_eq!(result, Err(RefreshFailure::Rejected { status: 401 }));
        assert!(!f.store.snapshot().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_logout_signs_out_and_navigates_to_login() {
        let mut f = fixture();
        f.store
            .login(credential_for(&["ROLE_USER"], f.start + secs(120)))
            .expect("login");
        let _guard = f.scheduler.start();
        settle().await;

        assert_eq!(f.scheduler.prompt().logout(), Destination::Login);
        settle().await;
        assert!(!f.store.snapshot().is_authenticated());

        advance(Duration::from_secs(600)).await;
        assert!(matches!(
            f.events.try_recv(),
            Ok(ExpiryEvent::Warning { .. })
        ));
        assert_eq!(f.events.try_recv(), Err(TryRecvError::Empty));
    }
}
