//! Role-based checkpoint in front of protected views.
//!
//! The gate never fetches domain data. It reads session snapshots, performs
//! at most one bootstrap refresh on first mount, and decides between a
//! loading placeholder, the protected children, or a redirect.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;

use crate::role::RequiredRoles;
use crate::store::{SessionState, SessionStore};

/// Named routing targets used by the session subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Shown when a session lacks a role the view requires.
    AccessDenied,
    /// The unauthenticated entry point.
    Login,
}

impl Destination {
    /// Returns the route path for this destination.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::AccessDenied => "/no-access",
            Self::Login => "/login",
        }
    }
}

/// Composite of session state and a view's role requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The session has not resolved yet.
    Bootstrapping,
    /// The session resolved without a credential.
    Unauthenticated,
    /// The session role is in the required set.
    Authorized,
    /// The session role is not in the required set.
    Forbidden,
}

impl GateState {
    /// Evaluates `state` against `required`.
    #[must_use]
    pub fn evaluate(state: &SessionState, required: &RequiredRoles) -> Self {
        if !state.is_initialized() {
            return Self::Bootstrapping;
        }
        match state.role() {
            None => Self::Unauthenticated,
            Some(role) if required.permits(Some(role)) => Self::Authorized,
            Some(_) => Self::Forbidden,
        }
    }
}

/// What a gated view should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<V> {
    /// Neutral placeholder while the session resolves.
    Loading,
    /// The protected content.
    Children(V),
    /// Navigate away instead of rendering.
    Redirect(Destination),
}

/// Authorization checkpoint wrapping one protected view.
pub struct AccessGate {
    store: SessionStore,
    required: RequiredRoles,
    mounted: AtomicBool,
}

impl AccessGate {
    /// Creates a gate admitting sessions whose role is in `required`.
    #[must_use]
    pub fn new(store: SessionStore, required: RequiredRoles) -> Self {
        Self {
            store,
            required,
            mounted: AtomicBool::new(false),
        }
    }

    /// Returns the roles this gate admits.
    #[must_use]
    pub fn required(&self) -> &RequiredRoles {
        &self.required
    }

    /// Evaluates the current session snapshot.
    #[must_use]
    pub fn state(&self) -> GateState {
        GateState::evaluate(&self.store.snapshot(), &self.required)
    }

    /// Mounts the gate.
    ///
    /// On the first mount without a credential, performs exactly one refresh
    /// before evaluating. Later mounts only evaluate.
    pub async fn mount(&self) -> GateState {
        let first_mount = !self.mounted.swap(true, Ordering::SeqCst);
        if first_mount && self.store.snapshot().credential().is_none() {
            debug!("no credential on first mount, attempting bootstrap refresh");
            if self.store.refresh().await.is_none() {
                debug!("bootstrap refresh did not produce a credential");
            }
        }

        let state = self.state();
        debug!(?state, "access gate evaluated");
        state
    }

    /// Decides what to display. `children` runs only when authorized.
    pub fn render<V>(&self, children: impl FnOnce() -> V) -> Rendered<V> {
        match self.state() {
            GateState::Bootstrapping => Rendered::Loading,
            GateState::Authorized => Rendered::Children(children()),
            GateState::Unauthenticated | GateState::Forbidden => {
                Rendered::Redirect(Destination::AccessDenied)
            }
        }
    }

    /// Subscribes to changes of this gate's state.
    #[must_use]
    pub fn subscribe(&self) -> GateSubscription {
        let rx = self.store.subscribe();
        let last = GateState::evaluate(&rx.borrow(), &self.required);
        GateSubscription {
            rx,
            required: self.required.clone(),
            last,
        }
    }
}

/// Stream of gate state transitions for re-rendering.
pub struct GateSubscription {
    rx: watch::Receiver<SessionState>,
    required: RequiredRoles,
    last: GateState,
}

impl GateSubscription {
    /// Returns the most recently observed gate state.
    #[must_use]
    pub fn current(&self) -> GateState {
        self.last
    }

    /// Waits for the gate state to change.
    ///
    /// Session changes that leave the gate state untouched (for example a
    /// refresh keeping the same role) are skipped. Returns `None` once the
    /// store is gone.
    pub async fn changed(&mut self) -> Option<GateState> {
        loop {
            self.rx.changed().await.ok()?;
            let next = GateState::evaluate(&self.rx.borrow_and_update(), &self.required);
            if next != self.last {
                self.last = next;
                return Some(next);
            }
        }
    }
}
