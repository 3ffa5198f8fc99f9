//! Role types for view-level access control.
//!
//! Roles arrive as free-form strings inside the credential's `role` claim
//! (e.g. `ROLE_ADMIN`). The claim set keeps the full issued sequence; a
//! session acts under a single primary role chosen by a [`PrimaryRolePolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role tag for catalog administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Role tag for regular profile owners.
pub const ROLE_USER: &str = "ROLE_USER";
/// Role tag for allergy specialists curating the catalog.
pub const ROLE_SPECIALIST: &str = "ROLE_SPECIALIST";

/// A role tag as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Creates a role from an issued tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The catalog administrator role.
    #[must_use]
    pub fn admin() -> Self {
        Self::new(ROLE_ADMIN)
    }

    /// The regular user role.
    #[must_use]
    pub fn user() -> Self {
        Self::new(ROLE_USER)
    }

    /// The allergy specialist role.
    #[must_use]
    pub fn specialist() -> Self {
        Self::new(ROLE_SPECIALIST)
    }

    /// Returns the role tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// The set of roles a protected view accepts.
///
/// An empty set accepts any authenticated role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredRoles {
    roles: Vec<Role>,
}

impl RequiredRoles {
    /// Accepts any authenticated role.
    #[must_use]
    pub fn any() -> Self {
        Self { roles: Vec::new() }
    }

    /// Accepts only the given roles.
    #[must_use]
    pub fn of(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut set = Vec::new();
        for role in roles {
            if !set.contains(&role) {
                set.push(role);
            }
        }
        Self { roles: set }
    }

    /// Returns true if a session acting as `role` may enter.
    ///
    /// An absent role is never permitted, even by an empty set.
    #[must_use]
    pub fn permits(&self, role: Option<&Role>) -> bool {
        match role {
            None => false,
            Some(_) if self.roles.is_empty() => true,
            Some(role) => self.roles.contains(role),
        }
    }

    /// Returns the accepted roles as a slice.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// Selects the single role a session acts under from the issued sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryRolePolicy {
    /// The first role in issue order.
    #[default]
    FirstIssued,
    /// The first role from `order` the credential carries, falling back to
    /// the first issued role.
    Preferred { order: Vec<Role> },
}

impl PrimaryRolePolicy {
    /// Selects the primary role, or `None` for an empty sequence.
    #[must_use]
    pub fn select<'a>(&self, issued: &'a [Role]) -> Option<&'a Role> {
        match self {
            Self::FirstIssued => issued.first(),
            Self::Preferred { order } => order
                .iter()
                .find_map(|wanted| issued.iter().find(|r| *r == wanted))
                .or_else(|| issued.first()),
        }
    }
}
