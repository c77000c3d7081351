use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

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
    /// Linked patient/professional profile, carried as `app_metadata.profile_id`.
    pub fn profile_id(&self) -> Option<Uuid> {
        self.app_metadata
            .as_ref()
            .and_then(|meta| meta.get("profile_id"))
            .and_then(|value| value.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub profile_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub profile_id: Option<Uuid>,
}

/// Closed set of roles understood by the clinic core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Professional,
    Admin,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        match self {
            Role::Patient => false,
            Role::Professional | Role::Admin => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "PATIENT"),
            Role::Professional => write!(f, "PROFESSIONAL"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "professional" | "doctor" | "staff" => Ok(Role::Professional),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Auth(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated caller as seen by the domain cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub profile_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, profile_id: Option<Uuid>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            profile_id,
        }
    }

    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<Role>()?;

        Ok(Self {
            user_id: user.id.clone(),
            role,
            profile_id: user.profile_id,
        })
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Only clinic staff may perform this action".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Patient | Role::Professional => {
                Err(AppError::Forbidden("Administrator role required".to_string()))
            }
        }
    }
}
