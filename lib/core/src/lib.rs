//! Core types shared across the allerdex allergen-catalog client.
//!
//! This crate provides the identifier newtypes carried in session claims and
//! the rootcause-based `Result` alias used at layer boundaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{Email, SubjectId};
