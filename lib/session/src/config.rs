//! Session lifecycle configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::role::PrimaryRolePolicy;

/// Configuration for the session store and expiry scheduler.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lead time before expiry at which the renew/logout prompt is shown.
    /// Default: 300 seconds
    #[serde(default = "default_warning_offset_seconds")]
    pub warning_offset_seconds: i64,

    /// Name of the persistent slot holding the raw credential.
    /// Default: "token"
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// How the session's single active role is chosen.
    #[serde(default)]
    pub primary_role: PrimaryRolePolicy,
}

fn default_warning_offset_seconds() -> i64 {
    300
}

fn default_storage_key() -> String {
    "token".to_string()
}

impl SessionConfig {
    /// Returns the warning lead time.
    ///
    /// Negative values are treated as zero; values too large for a
    /// [`TimeDelta`] saturate at [`TimeDelta::MAX`].
    #[must_use]
    pub fn warning_offset(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.warning_offset_seconds.max(0)).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warning_offset_seconds: default_warning_offset_seconds(),
            storage_key: default_storage_key(),
            primary_role: PrimaryRolePolicy::default(),
        }
    }
}
