//! Backend endpoint configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the catalog backend transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://api.example.com`.
    /// Default: "http://localhost:8080"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the credential-issuing endpoint.
    /// Default: "/auth/login"
    #[serde(default = "default_authenticate_path")]
    pub authenticate_path: String,

    /// Path of the renewal endpoint.
    /// Default: "/auth/refresh"
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Per-request timeout in seconds.
    /// Default: 30
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_authenticate_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ApiConfig {
    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Joins `path` onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            authenticate_path: default_authenticate_path(),
            refresh_path: default_refresh_path(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
