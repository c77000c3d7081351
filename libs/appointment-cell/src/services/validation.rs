//! Validate-then-commit checks run once per mutating operation.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use resource_cell::ResourceDirectory;

use crate::models::{AppointmentError, SchedulingRules};

pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppointmentError> {
    if end <= start {
        return Err(AppointmentError::ValidationError(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

/// Time-window rules for a proposed slot. Only applied when the start moves.
pub fn validate_schedule(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    rules: &SchedulingRules,
) -> Result<(), AppointmentError> {
    validate_interval(start, end)?;
    if start < now {
        return Err(AppointmentError::ValidationError(
            "Cannot schedule appointments in the past".to_string(),
        ));
    }
    if start > now + rules.max_advance {
        return Err(AppointmentError::ValidationError(format!(
            "Cannot schedule appointments more than {} days in advance",
            rules.max_advance.num_days()
        )));
    }
    Ok(())
}

pub fn validate_treatment(treatment_type: &str) -> Result<(), AppointmentError> {
    if treatment_type.trim().is_empty() {
        return Err(AppointmentError::ValidationError(
            "treatment_type must not be blank".to_string(),
        ));
    }
    Ok(())
}

/// Every referenced row must exist.
pub fn ensure_references(
    conn: &Connection,
    patient_id: Uuid,
    professional_id: Uuid,
    room_id: Uuid,
    equipment_ids: &[Uuid],
) -> Result<(), AppointmentError> {
    if !ResourceDirectory::patient_exists(conn, patient_id)? {
        return Err(AppointmentError::ReferenceNotFound(format!("patient {}", patient_id)));
    }
    if !ResourceDirectory::professional_exists(conn, professional_id)? {
        return Err(AppointmentError::ReferenceNotFound(format!(
            "professional {}",
            professional_id
        )));
    }
    if !ResourceDirectory::room_exists(conn, room_id)? {
        return Err(AppointmentError::ReferenceNotFound(format!("room {}", room_id)));
    }
    ResourceDirectory::ensure_equipment_exists(conn, equipment_ids)?;
    Ok(())
}
