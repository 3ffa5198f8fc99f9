//! Bearer credential decoding.
//!
//! A credential is three base64url segments (`header.claims.signature`). The
//! claims segment must be a JSON object carrying `jti` (subject id), `sub`
//! (email), `role` (non-empty sequence of role tags) and `exp` (unix seconds).
//!
//! Signatures are never checked here. The backend verifies every credential
//! it receives; the client only reads claims to drive its own lifecycle.

use allerdex_core::{Email, SubjectId};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::DecodeError;
use crate::role::Role;

/// An opaque bearer credential as issued by the backend.
///
/// `Debug` output is redacted so credentials never reach logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wraps an issued credential string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw credential string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value for an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Credential {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Typed claims decoded from a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    subject_id: SubjectId,
    email: Email,
    /// Roles in issue order, never empty.
    roles: Vec<Role>,
    expiry: DateTime<Utc>,
}

impl ClaimSet {
    /// Creates a claim set. Expiry is truncated to whole seconds, matching
    /// the wire precision of `exp`.
    #[must_use]
    pub fn new(
        subject_id: impl Into<SubjectId>,
        email: impl Into<Email>,
        roles: Vec<Role>,
        expiry: DateTime<Utc>,
    ) -> Self {
        let expiry = DateTime::from_timestamp(expiry.timestamp(), 0).unwrap_or(expiry);
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            roles,
            expiry,
        }
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    /// Returns the email the subject authenticated with.
    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Returns the roles in issue order.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns the absolute expiry instant.
    #[must_use]
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }
}

/// Decodes a credential into its claim set.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the credential is structurally invalid or
/// any required claim is missing or malformed.
pub fn decode(credential: &Credential) -> Result<ClaimSet, DecodeError> {
    let segments: Vec<&str> = credential.as_str().split('.').collect();
    let [header, claims, _signature] = segments.as_slice() else {
        return Err(DecodeError::Malformed {
            segments: segments.len(),
        });
    };

    decode_object(header, "header")?;
    let claims = decode_object(claims, "claims")?;

    let subject_id = match claims.get("jti") {
        Some(Value::String(s)) if !s.is_empty() => SubjectId::new(s.clone()),
        Some(Value::Number(n)) => SubjectId::new(n.to_string()),
        Some(Value::Null) | None => return Err(DecodeError::MissingClaim { claim: "jti" }),
        Some(_) => {
            return Err(DecodeError::InvalidClaims {
                claim: "jti",
                reason: "expected a non-empty string or number".to_string(),
            });
        }
    };

    let email = match claims.get("sub") {
        Some(Value::String(s)) if !s.is_empty() => Email::new(s.clone()),
        Some(Value::Null) | None => return Err(DecodeError::MissingClaim { claim: "sub" }),
        Some(_) => {
            return Err(DecodeError::InvalidClaims {
                claim: "sub",
                reason: "expected a non-empty string".to_string(),
            });
        }
    };

    let roles = match claims.get("role") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(tag) if !tag.is_empty() => Ok(Role::new(tag.clone())),
                _ => Err(DecodeError::InvalidClaims {
                    claim: "role",
                    reason: "expected a sequence of role strings".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => return Err(DecodeError::MissingClaim { claim: "role" }),
        Some(_) => {
            return Err(DecodeError::InvalidClaims {
                claim: "role",
                reason: "expected a sequence of role strings".to_string(),
            });
        }
    };
    if roles.is_empty() {
        return Err(DecodeError::NoRoles);
    }

    let expiry = match claims.get("exp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| DecodeError::InvalidClaims {
                claim: "exp",
                reason: format!("{n} is not a representable unix timestamp"),
            })?,
        Some(Value::Null) | None => return Err(DecodeError::MissingClaim { claim: "exp" }),
        Some(_) => {
            return Err(DecodeError::InvalidClaims {
                claim: "exp",
                reason: "expected unix seconds".to_string(),
            });
        }
    };

    Ok(ClaimSet {
        subject_id,
        email,
        roles,
        expiry,
    })
}

/// Returns true when the claim set's expiry is at or before `now`.
#[must_use]
pub fn is_expired(claims: &ClaimSet, now: DateTime<Utc>) -> bool {
    claims.expiry <= now
}

/// Builds an unsigned credential carrying `claims`.
///
/// The backend never accepts these; they exist for fixtures and tests.
#[must_use]
pub fn encode_unsigned(claims: &ClaimSet) -> Credential {
    let header = serde_json::json!({ "alg": "none", "typ": "JWT" });
    let body = serde_json::json!({
        "jti": claims.subject_id.as_str(),
        "sub": claims.email.as_str(),
        "role": claims.roles.iter().map(Role::as_str).collect::<Vec<_>>(),
        "exp": claims.expiry.timestamp(),
    });

    Credential(format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(body.to_string()),
    ))
}

fn decode_object(segment: &str, name: &'static str) -> Result<Map<String, Value>, DecodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| DecodeError::InvalidSegment {
            segment: name,
            reason: e.to_string(),
        })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::InvalidSegment {
            segment: name,
            reason: "not a JSON object".to_string(),
        }),
        Err(e) => Err(DecodeError::InvalidSegment {
            segment: name,
            reason: e.to_string(),
        }),
    }
}
