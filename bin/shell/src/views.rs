//! Protected views offered by the shell and their role requirements.

use allerdex_session::{RequiredRoles, Role, SessionState};
use std::fmt;
use std::str::FromStr;

/// A role-restricted screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Allergen catalog, open to any signed-in role.
    Catalog,
    /// The signed-in user's allergen profile.
    Profile,
    /// Catalog editing for specialists.
    Editor,
    /// User and role administration.
    Admin,
}

impl View {
    pub const ALL: [View; 4] = [View::Catalog, View::Profile, View::Editor, View::Admin];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Profile => "profile",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    /// Returns the roles admitted to this view.
    #[must_use]
    pub fn required_roles(&self) -> RequiredRoles {
        match self {
            Self::Catalog => RequiredRoles::any(),
            Self::Profile => RequiredRoles::of([Role::user(), Role::specialist()]),
            Self::Editor => RequiredRoles::of([Role::specialist(), Role::admin()]),
            Self::Admin => RequiredRoles::of([Role::admin()]),
        }
    }

    /// Backend resource the view lists, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&'static str> {
        match self {
            Self::Catalog | Self::Editor => Some("/allergens"),
            Self::Profile => Some("/profile"),
            Self::Admin => Some("/users"),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown view '{}'", s))
    }
}

/// One-line summary of the session for the header.
#[must_use]
pub fn describe(state: &SessionState) -> String {
    if !state.is_initialized() {
        return "session resolving".to_string();
    }
    match (state.claims(), state.role()) {
        (Some(claims), Some(role)) => {
            let roles: Vec<&str> = claims.roles().iter().map(Role::as_str).collect();
            format!(
                "signed in as {} (id {}) acting as {} [{}], expires {}",
                claims.email(),
                claims.subject_id(),
                role,
                roles.join(", "),
                claims.expiry().to_rfc3339()
            )
        }
        _ => "signed out".to_string(),
    }
}
