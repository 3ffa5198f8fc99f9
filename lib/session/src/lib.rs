//! Session and authorization lifecycle for the allerdex client.
//!
//! This crate provides:
//! - Credential decoding (`Credential`, `ClaimSet`, [`codec::decode`])
//! - Role model and primary-role selection (`Role`, `RequiredRoles`, `PrimaryRolePolicy`)
//! - The single-writer session store (`SessionStore`, `SessionState`)
//! - Proactive expiry handling (`ExpiryScheduler`, `ExpiryEvent`)
//! - Role-based view gating (`AccessGate`, `GateState`, `Rendered`)
//!
//! # Session Model
//!
//! The store is constructed once at startup and shared by cloning the handle.
//! It is the only writer of session state; every other component reads
//! [`SessionState`] snapshots through a watch channel and calls the store's
//! `login`, `logout`, and `refresh` operations.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use allerdex_session::{
//!     AccessGate, FixedClock, MemoryStorage, Rendered, RequiredRoles, Role, SessionStore,
//!     codec::{ClaimSet, encode_unsigned},
//!     refresh::UnavailableRefreshClient,
//! };
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let store = SessionStore::builder(Arc::new(MemoryStorage::new()), Arc::new(UnavailableRefreshClient))
//!     .clock(Arc::new(FixedClock::new(now)))
//!     .build();
//!
//! let claims = ClaimSet::new("7", "alice@example.com", vec![Role::specialist()], now + Duration::hours(1));
//! store.login(encode_unsigned(&claims)).expect("valid credential");
//!
//! let gate = AccessGate::new(store.clone(), RequiredRoles::of([Role::specialist(), Role::user()]));
//! assert!(matches!(gate.render(|| "allergen editor"), Rendered::Children("allergen editor")));
//!
//! let admin_gate = AccessGate::new(store, RequiredRoles::of([Role::admin()]));
//! assert!(matches!(admin_gate.render(|| "admin"), Rendered::Redirect(_)));
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod gate;
pub mod refresh;
pub mod role;
pub mod scheduler;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types at crate root
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{ClaimSet, Credential};
pub use config::SessionConfig;
pub use error::{DecodeError, LoginError, RefreshFailure, StorageError};
pub use gate::{AccessGate, Destination, GateState, GateSubscription, Rendered};
pub use refresh::RefreshClient;
pub use role::{PrimaryRolePolicy, RequiredRoles, Role};
pub use scheduler::{
    ArmedTimers, ExpiryEvent, ExpiryPrompt, ExpiryScheduler, SchedulerGuard, TimerHandle,
};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::{SessionState, SessionStore, SessionStoreBuilder};
