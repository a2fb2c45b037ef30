// common/src/models/session.rs
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried by a signed session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
    Mailbox,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::User, Role::Guest, Role::Mailbox];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
            Role::Mailbox => "mailbox",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            "mailbox" => Ok(Role::Mailbox),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Claims as they appear inside the signed token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub role: Role,
    #[serde(default)]
    pub username: String,
    pub exp: i64, // expiry, seconds since the epoch
}

/// Decoded, verified session for the lifetime of one request.
///
/// Never persisted. A request without one is anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub role: Role,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionPayload {
    /// Build a payload from verified claims. Returns `None` if `exp` is out of range.
    pub fn from_claims(claims: SessionClaims) -> Option<Self> {
        let expires_at = Utc.timestamp_opt(claims.exp, 0).single()?;
        Some(Self {
            role: claims.role,
            username: claims.username,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
