//! Centralized shell configuration.
//!
//! Loaded via the `config` crate from environment variables prefixed with
//! `ALLERDEX_`, using `__` between nested keys, e.g.
//! `ALLERDEX_API__BASE_URL` or `ALLERDEX_SESSION__WARNING_OFFSET_SECONDS`.

use allerdex_api::ApiConfig;
use allerdex_session::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Shell configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Directory holding the persisted credential slot.
    /// Default: ".allerdex"
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Session lifecycle configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Backend transport configuration.
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".allerdex")
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            session: SessionConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::with_prefix("ALLERDEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source(
        source: impl config::Source + Send + Sync + 'static,
    ) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        config::Environment::with_prefix("ALLERDEX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn shell_config_has_correct_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from(".allerdex"));
        assert_eq!(config.session.warning_offset_seconds, 300);
        assert_eq!(config.session.storage_key, "token");
        assert_eq!(config.api.refresh_path, "/auth/refresh");
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ShellConfig::from_source(env(&[])).expect("load");
        assert_eq!(config.storage_dir, PathBuf::from(".allerdex"));
        assert_eq!(config.api.base_url, "http://localhost:8080");
    }

    #[test]
    fn nested_variables_override_defaults() {
        let config = ShellConfig::from_source(env(&[
            ("ALLERDEX_STORAGE_DIR", "/tmp/allerdex"),
            ("ALLERDEX_API__BASE_URL", "https://api.example.com"),
            ("ALLERDEX_SESSION__WARNING_OFFSET_SECONDS", "120"),
        ]))
        .expect("load");

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/allerdex"));
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.session.warning_offset_seconds, 120);
        assert_eq!(config.session.storage_key, "token");
    }
}
