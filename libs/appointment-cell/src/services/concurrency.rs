//! Optimistic version guard for appointment edits.

use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::repository;

/// Compare a client-held version with the persisted one.
///
/// `None` skips the check; the write still bumps the version.
pub fn check_version(expected: Option<u32>, current: &Appointment) -> Result<(), AppointmentError> {
    match expected {
        Some(version) if version != current.version => {
            warn!(
                "Stale edit of appointment {}: client has version {}, store has {}",
                current.id, version, current.version
            );
            Err(AppointmentError::StaleVersion(Box::new(current.clone())))
        }
        _ => Ok(()),
    }
}

/// Map the row count of a `WHERE id = ? AND version = ?` update.
///
/// Zero rows means someone else saved first; the fresh record goes back to the
/// caller.
pub fn ensure_bumped(
    conn: &Connection,
    appointment_id: Uuid,
    rows_affected: usize,
) -> Result<(), AppointmentError> {
    if rows_affected > 0 {
        return Ok(());
    }
    let current = repository::get(conn, appointment_id)?;
    Err(AppointmentError::StaleVersion(Box::new(current)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn at_version(version: u32) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            equipment_ids: vec![],
            start_time: now,
            end_time: now + Duration::hours(1),
            status: AppointmentStatus::Confirmed,
            treatment_type: "Masaje".to_string(),
            notes: String::new(),
            created_by: None,
            version,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_version_guard() {
        let current = at_version(3);
        assert!(check_version(None, &current).is_ok());
        assert!(check_version(Some(3), &current).is_ok());
        assert_matches!(
            check_version(Some(2), &current),
            Err(AppointmentError::StaleVersion(ref fresh)) if fresh.version == 3
        );
    }
}
