//! HTTP transport for the allerdex catalog backend.
//!
//! [`ApiClient`] performs the two credential calls (`authenticate` and
//! `refresh`) and implements [`allerdex_session::RefreshClient`].
//! [`AuthorizedApi`] attaches the session's bearer credential to every
//! other call.
//!
//! Unauthorized (401) responses are logged and returned as
//! [`NetworkError::Unauthorized`]. They never refresh or sign out the
//! session on their own.

pub mod authorized;
pub mod client;
pub mod config;
pub mod error;

pub use authorized::AuthorizedApi;
pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::NetworkError;
