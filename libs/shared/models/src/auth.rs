use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Application role from `app_metadata.role`, falling back to the
    /// top-level claim. `user_metadata` is writable by the user and is never
    /// consulted.
    pub fn application_role(&self) -> Option<&str> {
        self.app_metadata
            .as_ref()
            .and_then(|m| m.get("role"))
            .and_then(|r| r.as_str())
            .or(self.role.as_deref())
    }
}

/// Caller roles, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Admin,
}

impl Role {
    /// Maps a role claim onto an application role. Supabase tags every
    /// signed-in user `authenticated`; registration only creates patients.
    pub fn from_claim(claim: Option<&str>) -> Option<Role> {
        match claim.map(|c| c.trim().to_ascii_lowercase()) {
            Some(c) if c == "admin" || c == "role_admin" => Some(Role::Admin),
            Some(c) if c == "patient" || c == "role_patient" || c == "authenticated" => {
                Some(Role::Patient)
            }
            None => Some(Role::Patient),
            Some(_) => None,
        }
    }

    pub fn at_least(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "PATIENT"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Authenticated caller as produced by token validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}
