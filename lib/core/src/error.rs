//! Error handling foundation for the allerdex client.
//!
//! Crates define their own domain error enums. Operations that surface a
//! failure to an initiating caller return them wrapped in a rootcause
//! [`Report`], converting with `?`.

use rootcause::Report;

/// Result whose error is a rootcause report over the context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
