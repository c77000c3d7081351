use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use shared_database::time::day_bounds;

use crate::models::{AppointmentError, OccupiedSlot};
use crate::services::repository;

pub struct AvailabilityService;

impl AvailabilityService {
    /// Raw intervals held by active appointments starting on `date` (UTC).
    ///
    /// Intervals are not merged; callers render them as-is.
    pub fn occupied_slots(
        conn: &Connection,
        date: NaiveDate,
        professional_id: Option<Uuid>,
        room_id: Option<Uuid>,
    ) -> Result<Vec<OccupiedSlot>, AppointmentError> {
        let (from, until) = day_bounds(date)?;
        let slots: Vec<OccupiedSlot> =
            repository::active_starting_between(conn, from, until, professional_id, room_id)?
                .into_iter()
                .map(|(start, end)| OccupiedSlot { start, end })
                .collect();

        debug!(
            "{} occupied slots on {} (professional {:?}, room {:?})",
            slots.len(),
            date,
            professional_id,
            room_id
        );
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rusqlite::params;
    use shared_database::{time::encode_timestamp, SCHEMA};

    struct Fixture {
        conn: Connection,
        patient: Uuid,
        professional: Uuid,
        room: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let (patient, professional, room) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stamp = "2030-01-01T00:00:00.000000Z";
        conn.execute(
            "INSERT INTO patient_profiles (id, user_id, full_name, created_at) VALUES (?1, 'u1', 'Ana', ?2)",
            params![patient.to_string(), stamp],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO professional_profiles (id, user_id, full_name, created_at) VALUES (?1, 'u2', 'Luis', ?2)",
            params![professional.to_string(), stamp],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO rooms (id, name, created_at) VALUES (?1, 'Sala 1', ?2)",
            params![room.to_string(), stamp],
        )
        .unwrap();
        Fixture { conn, patient, professional, room }
    }

    fn book(f: &Fixture, day: u32, hour: u32, status: &str) {
        let start = Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 6, day, hour + 1, 0, 0).unwrap();
        f.conn
            .execute(
                "INSERT INTO appointments (id, patient_id, professional_id, room_id, start_time, end_time,
                    status, treatment_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'Masaje', ?5, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    f.patient.to_string(),
                    f.professional.to_string(),
                    f.room.to_string(),
                    encode_timestamp(&start),
                    encode_timestamp(&end),
                    status
                ],
            )
            .unwrap();
    }

    #[test]
    fn test_empty_day() {
        let f = fixture();
        let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
        assert!(AvailabilityService::occupied_slots(&f.conn, date, None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_only_active_appointments_on_that_day() {
        let f = fixture();
        book(&f, 3, 9, "CONFIRMED");
        book(&f, 3, 12, "PENDING");
        book(&f, 3, 15, "CANCELLED");
        book(&f, 3, 17, "COMPLETED");
        book(&f, 4, 9, "CONFIRMED");

        let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
        let slots = AvailabilityService::occupied_slots(&f.conn, date, None, None).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start, Utc.with_ymd_and_hms(2030, 6, 3, 9, 0, 0).unwrap());

        let by_professional =
            AvailabilityService::occupied_slots(&f.conn, date, Some(f.professional), None).unwrap();
        assert_eq!(by_professional, slots);

        let other_room =
            AvailabilityService::occupied_slots(&f.conn, date, None, Some(Uuid::new_v4())).unwrap();
        assert!(other_room.is_empty());
    }
}
