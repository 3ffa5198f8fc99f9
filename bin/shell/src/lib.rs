//! Terminal host for the allerdex session lifecycle.
//!
//! Wires a [`SessionStore`](allerdex_session::SessionStore) backed by file
//! storage and the HTTP transport, starts the expiry scheduler, and exposes
//! login, gated views, and the extend/logout prompt as line commands.

pub mod config;
pub mod error;
pub mod shell;
pub mod views;
