// libs/appointment-cell/src/models.rs
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use notification_cell::AppointmentNotice;
use resource_cell::ResourceError;
use shared_config::{
    AppConfig, CANCELLATION_NOTICE_HOURS, DEFAULT_APPOINTMENT_MINUTES, MAX_ADVANCE_BOOKING_DAYS,
};
use shared_database::{parse_uuid, time::decode_timestamp, DbError};
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub room_id: Uuid,
    pub equipment_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub treatment_type: String,
    pub notes: String,
    pub created_by: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn notice(&self) -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: self.id,
            patient_id: self.patient_id,
            treatment_type: self.treatment_type.clone(),
            start_time: self.start_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Active appointments hold their professional and room.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status {}", other)),
        }
    }
}

/// Raw `appointments` row; equipment membership is loaded separately.
pub(crate) struct AppointmentRow {
    pub id: String,
    pub patient_id: String,
    pub professional_id: String,
    pub room_id: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub treatment_type: String,
    pub notes: String,
    pub created_by: Option<String>,
    pub version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: parse_uuid(&row.id)?,
            patient_id: parse_uuid(&row.patient_id)?,
            professional_id: parse_uuid(&row.professional_id)?,
            room_id: parse_uuid(&row.room_id)?,
            equipment_ids: Vec::new(),
            start_time: decode_timestamp(&row.start_time)?,
            end_time: decode_timestamp(&row.end_time)?,
            status: row.status.parse().map_err(DbError::Malformed)?,
            treatment_type: row.treatment_type,
            notes: row.notes,
            created_by: row.created_by,
            version: row.version,
            created_at: decode_timestamp(&row.created_at)?,
            updated_at: decode_timestamp(&row.updated_at)?,
        })
    }
}

// ==============================================================================
// REQUEST / QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    #[serde(default)]
    pub equipment_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub treatment_type: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    /// Client-held version for the optimistic check.
    pub version: Option<u32>,
    pub professional_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub equipment_ids: Option<Vec<Uuid>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub treatment_type: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl UpdateAppointmentRequest {
    /// True when the request touches scheduling or clinical fields, as opposed
    /// to a pure status change.
    pub fn edits_details(&self) -> bool {
        self.professional_id.is_some()
            || self.room_id.is_some()
            || self.equipment_ids.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.treatment_type.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
    pub professional_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub professional_id: Uuid,
    pub room_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of an approve/cancel/complete action.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub status_token: &'static str,
    pub appointment: Appointment,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingRules {
    pub cancellation_notice: Duration,
    pub max_advance: Duration,
    pub default_duration: Duration,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            cancellation_notice: Duration::hours(24),
            max_advance: Duration::days(90),
            default_duration: Duration::minutes(60),
        }
    }
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cancellation_notice: Duration::hours(clamp(
                config.cancellation_notice_hours,
                &CANCELLATION_NOTICE_HOURS,
            )),
            max_advance: Duration::days(clamp(
                config.max_advance_booking_days,
                &MAX_ADVANCE_BOOKING_DAYS,
            )),
            default_duration: Duration::minutes(clamp(
                config.default_appointment_minutes,
                &DEFAULT_APPOINTMENT_MINUTES,
            )),
        }
    }
}

fn clamp(value: i64, range: &RangeInclusive<i64>) -> i64 {
    value.clamp(*range.start(), *range.end())
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Referenced {0} does not exist")]
    ReferenceNotFound(String),

    #[error("Professional already has an active appointment in this slot ({appointment_id})")]
    ProfessionalConflict { appointment_id: Uuid },

    #[error("Room already has an active appointment in this slot ({appointment_id})")]
    RoomConflict { appointment_id: Uuid },

    #[error("No rooms available. Please contact the administrator.")]
    NoRoomsAvailable,

    #[error("Appointment was modified by another user (current version {})", .0.version)]
    StaleVersion(Box<Appointment>),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Appointments can only be cancelled at least {notice_hours} hours in advance")]
    CancellationWindowViolation { notice_hours: i64 },

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Past appointments are kept for the clinical record and cannot be deleted")]
    HistoricalRecord,

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for AppointmentError {
    fn from(err: rusqlite::Error) -> Self {
        AppointmentError::Database(DbError::from(err))
    }
}

impl From<ResourceError> for AppointmentError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound(what) => AppointmentError::ReferenceNotFound(what),
            ResourceError::Database(db) => AppointmentError::Database(db),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::ReferenceNotFound(_)
            | AppointmentError::NoRoomsAvailable
            | AppointmentError::CancellationWindowViolation { .. }
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::HistoricalRecord => AppError::BadRequest(err.to_string()),
            AppointmentError::ProfessionalConflict { .. }
            | AppointmentError::RoomConflict { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::StaleVersion(ref current) => AppError::StaleVersion {
                message: err.to_string(),
                current: serde_json::to_value(current.as_ref()).unwrap_or(Value::Null),
            },
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Database(db) => db.into(),
        }
    }
}
