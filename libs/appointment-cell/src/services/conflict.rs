use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{parse_uuid, time::encode_timestamp};

use crate::models::{Appointment, AppointmentError};

/// Outcome of a slot check. The professional check runs first and wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConflictResult {
    NoConflict,
    ProfessionalConflict { appointment_id: Uuid },
    RoomConflict { appointment_id: Uuid },
}

impl ConflictResult {
    pub fn has_conflict(&self) -> bool {
        !matches!(self, ConflictResult::NoConflict)
    }

    pub fn into_result(self) -> Result<(), AppointmentError> {
        match self {
            ConflictResult::NoConflict => Ok(()),
            ConflictResult::ProfessionalConflict { appointment_id } => {
                Err(AppointmentError::ProfessionalConflict { appointment_id })
            }
            ConflictResult::RoomConflict { appointment_id } => {
                Err(AppointmentError::RoomConflict { appointment_id })
            }
        }
    }
}

/// A window someone wants to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub professional_id: Uuid,
    pub room_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exclude: Option<Uuid>,
}

/// Half-open interval overlap: `[start1, end1)` and `[start2, end2)`.
pub fn appointments_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

/// Same rule as [`ConflictDetectionService::check_conflict`], evaluated over
/// an in-memory snapshot instead of the store.
pub fn detect_conflict(candidate: &SlotCandidate, snapshot: &[Appointment]) -> ConflictResult {
    let blocking = |appointment: &&Appointment| {
        appointment.is_active()
            && Some(appointment.id) != candidate.exclude
            && appointments_overlap(
                appointment.start_time,
                appointment.end_time,
                candidate.start,
                candidate.end,
            )
    };

    if let Some(hit) = snapshot
        .iter()
        .filter(blocking)
        .find(|a| a.professional_id == candidate.professional_id)
    {
        return ConflictResult::ProfessionalConflict { appointment_id: hit.id };
    }

    if let Some(room_id) = candidate.room_id {
        if let Some(hit) = snapshot
            .iter()
            .filter(blocking)
            .find(|a| a.room_id == room_id)
        {
            return ConflictResult::RoomConflict { appointment_id: hit.id };
        }
    }

    ConflictResult::NoConflict
}

const OVERLAP_BY_PROFESSIONAL: &str = "
    SELECT id FROM appointments
    WHERE professional_id = ?1
      AND status IN ('PENDING', 'CONFIRMED')
      AND start_time < ?3 AND end_time > ?2
      AND (?4 IS NULL OR id != ?4)
    ORDER BY start_time
    LIMIT 1";

const OVERLAP_BY_ROOM: &str = "
    SELECT id FROM appointments
    WHERE room_id = ?1
      AND status IN ('PENDING', 'CONFIRMED')
      AND start_time < ?3 AND end_time > ?2
      AND (?4 IS NULL OR id != ?4)
    ORDER BY start_time
    LIMIT 1";

pub struct ConflictDetectionService;

impl ConflictDetectionService {
    /// Read-only overlap check against active appointments.
    ///
    /// Run it on the same connection, inside the same transaction, as the
    /// write it guards.
    pub fn check_conflict(
        conn: &Connection,
        professional_id: Uuid,
        room_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictResult, AppointmentError> {
        debug!(
            "Checking conflicts for professional {} room {:?} from {} to {}",
            professional_id, room_id, start, end
        );

        let start_text = encode_timestamp(&start);
        let end_text = encode_timestamp(&end);
        let exclude = exclude_appointment_id.map(|id| id.to_string());

        let overlapping = |sql: &str, owner: Uuid| -> Result<Option<Uuid>, AppointmentError> {
            let raw: Option<String> = conn
                .query_row(
                    sql,
                    params![owner.to_string(), start_text, end_text, exclude],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(raw.as_deref().map(parse_uuid).transpose()?)
        };

        if let Some(appointment_id) = overlapping(OVERLAP_BY_PROFESSIONAL, professional_id)? {
            warn!(
                "Professional {} already booked by appointment {}",
                professional_id, appointment_id
            );
            return Ok(ConflictResult::ProfessionalConflict { appointment_id });
        }

        if let Some(room_id) = room_id {
            if let Some(appointment_id) = overlapping(OVERLAP_BY_ROOM, room_id)? {
                warn!("Room {} already booked by appointment {}", room_id, appointment_id);
                return Ok(ConflictResult::RoomConflict { appointment_id });
            }
        }

        Ok(ConflictResult::NoConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 6, hour, minute, 0).unwrap()
    }

    fn booked(professional: Uuid, room: Uuid, start: DateTime<Utc>, minutes: i64) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            professional_id: professional,
            room_id: room,
            equipment_ids: vec![],
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            status: AppointmentStatus::Pending,
            treatment_type: "Fisioterapia".to_string(),
            notes: String::new(),
            created_by: None,
            version: 1,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_half_open_overlap() {
        assert!(appointments_overlap(at(10, 0), at(11, 0), at(10, 30), at(11, 30)));
        assert!(appointments_overlap(at(10, 0), at(11, 0), at(9, 0), at(12, 0)));
        assert!(!appointments_overlap(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(!appointments_overlap(at(10, 0), at(11, 0), at(9, 0), at(10, 0)));
    }

    #[test]
    fn test_detect_reports_professional_before_room() {
        let (p1, p2, r1, r2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let a = booked(p1, r1, at(10, 0), 60);
        let snapshot = vec![a.clone()];

        let both = SlotCandidate {
            professional_id: p1,
            room_id: Some(r1),
            start: at(10, 30),
            end: at(11, 30),
            exclude: None,
        };
        assert_eq!(
            detect_conflict(&both, &snapshot),
            ConflictResult::ProfessionalConflict { appointment_id: a.id }
        );

        let room_only = SlotCandidate { professional_id: p2, ..both };
        assert_eq!(
            detect_conflict(&room_only, &snapshot),
            ConflictResult::RoomConflict { appointment_id: a.id }
        );

        let no_room = SlotCandidate { room_id: None, ..room_only };
        assert_eq!(detect_conflict(&no_room, &snapshot), ConflictResult::NoConflict);

        let touching = SlotCandidate {
            professional_id: p1,
            room_id: Some(r2),
            start: at(11, 0),
            end: at(12, 0),
            exclude: None,
        };
        assert_eq!(detect_conflict(&touching, &snapshot), ConflictResult::NoConflict);
    }

    #[test]
    fn test_inactive_and_excluded_never_conflict() {
        let (p1, r1) = (Uuid::new_v4(), Uuid::new_v4());
        let mut cancelled = booked(p1, r1, at(10, 0), 60);
        cancelled.status = AppointmentStatus::Cancelled;
        let mut completed = booked(p1, r1, at(10, 0), 60);
        completed.status = AppointmentStatus::Completed;
        let pending = booked(p1, r1, at(10, 0), 60);

        let candidate = SlotCandidate {
            professional_id: p1,
            room_id: Some(r1),
            start: at(10, 0),
            end: at(11, 0),
            exclude: Some(pending.id),
        };
        assert_eq!(
            detect_conflict(&candidate, &[cancelled, completed, pending]),
            ConflictResult::NoConflict
        );
    }

    #[test]
    fn test_into_result() {
        let id = Uuid::new_v4();
        assert!(ConflictResult::NoConflict.into_result().is_ok());
        assert!(matches!(
            ConflictResult::RoomConflict { appointment_id: id }.into_result(),
            Err(AppointmentError::RoomConflict { appointment_id }) if appointment_id == id
        ));
    }
}
