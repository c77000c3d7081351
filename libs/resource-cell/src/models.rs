use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{parse_uuid, time::decode_timestamp, DbError};
use shared_models::error::AppError;

// ==============================================================================
// ROOMS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "AVAILABLE",
            RoomStatus::Occupied => "OCCUPIED",
            RoomStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(RoomStatus::Available),
            "OCCUPIED" => Ok(RoomStatus::Occupied),
            "MAINTENANCE" => Ok(RoomStatus::Maintenance),
            other => Err(format!("unknown room status {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: RoomStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Raw `rooms` row as read from SQLite.
pub(crate) struct RoomRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub is_active: bool,
    pub created_at: String,
}

impl TryFrom<RoomRow> for Room {
    type Error = DbError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        Ok(Room {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            status: row.status.parse().map_err(DbError::Malformed)?,
            is_active: row.is_active,
            created_at: decode_timestamp(&row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<RoomStatus>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomQuery {
    #[serde(default)]
    pub active_only: bool,
}

// ==============================================================================
// EQUIPMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Available,
    Maintenance,
    OutOfService,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "AVAILABLE",
            EquipmentStatus::Maintenance => "MAINTENANCE",
            EquipmentStatus::OutOfService => "OUT_OF_SERVICE",
        }
    }
}

impl FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(EquipmentStatus::Available),
            "MAINTENANCE" => Ok(EquipmentStatus::Maintenance),
            "OUT_OF_SERVICE" => Ok(EquipmentStatus::OutOfService),
            other => Err(format!("unknown equipment status {}", other)),
        }
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub room_id: Option<Uuid>,
    pub status: EquipmentStatus,
    pub serial_number: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) struct EquipmentRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub room_id: Option<String>,
    pub status: String,
    pub serial_number: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = DbError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Equipment {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            room_id: row.room_id.as_deref().map(parse_uuid).transpose()?,
            status: row.status.parse().map_err(DbError::Malformed)?,
            serial_number: row.serial_number,
            is_active: row.is_active,
            created_at: decode_timestamp(&row.created_at)?,
            updated_at: decode_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub room_id: Option<Uuid>,
    pub status: Option<EquipmentStatus>,
    #[serde(default)]
    pub serial_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquipmentQuery {
    pub status: Option<EquipmentStatus>,
    pub room_id: Option<Uuid>,
}

// ==============================================================================
// PROFILES
// ==============================================================================

/// Registered patient identity that appointments point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub specialty: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatientRequest {
    pub user_id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProfessionalRequest {
    pub user_id: String,
    pub full_name: String,
    #[serde(default)]
    pub specialty: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is still referenced by appointments")]
    InUse(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for ResourceError {
    fn from(err: rusqlite::Error) -> Self {
        ResourceError::Database(DbError::from(err))
    }
}

impl From<ResourceError> for AppError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound(_) => AppError::NotFound(err.to_string()),
            ResourceError::InUse(_) => AppError::Conflict(err.to_string()),
            ResourceError::Duplicate(_) => AppError::Conflict(err.to_string()),
            ResourceError::Validation(msg) => AppError::ValidationError(msg),
            ResourceError::Database(db) => db.into(),
        }
    }
}
