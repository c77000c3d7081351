//! SQL persistence for appointments and their equipment membership.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use shared_database::parse_uuid;
use shared_database::time::{day_bounds, decode_timestamp, encode_timestamp};

use crate::models::{Appointment, AppointmentError, AppointmentListQuery, AppointmentRow};
use crate::services::concurrency;

const COLUMNS: &str = "id, patient_id, professional_id, room_id, start_time, end_time, status, \
                       treatment_type, notes, created_by, version, created_at, updated_at";

fn appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        professional_id: row.get(2)?,
        room_id: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        status: row.get(6)?,
        treatment_type: row.get(7)?,
        notes: row.get(8)?,
        created_by: row.get(9)?,
        version: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn hydrate(conn: &Connection, row: AppointmentRow) -> Result<Appointment, AppointmentError> {
    let mut appointment = Appointment::try_from(row)?;
    appointment.equipment_ids = equipment_for(conn, appointment.id)?;
    Ok(appointment)
}

pub fn equipment_for(conn: &Connection, appointment_id: Uuid) -> Result<Vec<Uuid>, AppointmentError> {
    let mut stmt = conn.prepare(
        "SELECT equipment_id FROM appointment_equipment WHERE appointment_id = ?1 ORDER BY equipment_id",
    )?;
    let raw = stmt
        .query_map([appointment_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(raw
        .iter()
        .map(|id| parse_uuid(id))
        .collect::<Result<Vec<_>, _>>()?)
}

fn replace_equipment(
    conn: &Connection,
    appointment_id: Uuid,
    equipment_ids: &[Uuid],
) -> Result<(), AppointmentError> {
    conn.execute(
        "DELETE FROM appointment_equipment WHERE appointment_id = ?1",
        [appointment_id.to_string()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO appointment_equipment (appointment_id, equipment_id) VALUES (?1, ?2)",
    )?;
    for equipment_id in equipment_ids {
        stmt.execute(params![appointment_id.to_string(), equipment_id.to_string()])?;
    }
    Ok(())
}

pub fn find(conn: &Connection, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
    let sql = format!("SELECT {} FROM appointments WHERE id = ?1", COLUMNS);
    let row = conn
        .query_row(&sql, [appointment_id.to_string()], appointment_row)
        .optional()?;
    row.map(|row| hydrate(conn, row)).transpose()
}

pub fn get(conn: &Connection, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
    find(conn, appointment_id)?.ok_or(AppointmentError::NotFound(appointment_id))
}

/// Persist a new appointment exactly as given (callers set version 1).
pub fn insert(conn: &Connection, appointment: &Appointment) -> Result<(), AppointmentError> {
    conn.execute(
        "INSERT INTO appointments
            (id, patient_id, professional_id, room_id, start_time, end_time, status,
             treatment_type, notes, created_by, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.professional_id.to_string(),
            appointment.room_id.to_string(),
            encode_timestamp(&appointment.start_time),
            encode_timestamp(&appointment.end_time),
            appointment.status.as_str(),
            appointment.treatment_type,
            appointment.notes,
            appointment.created_by,
            appointment.version,
            encode_timestamp(&appointment.created_at),
            encode_timestamp(&appointment.updated_at),
        ],
    )?;
    replace_equipment(conn, appointment.id, &appointment.equipment_ids)
}

/// Write every mutable column of `next`, guarded by `expected_version` and
/// bumping the stored version by one in the same statement.
pub fn update(
    conn: &Connection,
    next: &Appointment,
    expected_version: u32,
    now: DateTime<Utc>,
) -> Result<Appointment, AppointmentError> {
    let rows = conn.execute(
        "UPDATE appointments SET
            professional_id = ?3,
            room_id = ?4,
            start_time = ?5,
            end_time = ?6,
            status = ?7,
            treatment_type = ?8,
            notes = ?9,
            version = version + 1,
            updated_at = ?10
         WHERE id = ?1 AND version = ?2",
        params![
            next.id.to_string(),
            expected_version,
            next.professional_id.to_string(),
            next.room_id.to_string(),
            encode_timestamp(&next.start_time),
            encode_timestamp(&next.end_time),
            next.status.as_str(),
            next.treatment_type,
            next.notes,
            encode_timestamp(&now),
        ],
    )?;
    concurrency::ensure_bumped(conn, next.id, rows)?;

    replace_equipment(conn, next.id, &next.equipment_ids)?;
    get(conn, next.id)
}

/// Equipment rows and notifications cascade with the appointment.
pub fn delete(conn: &Connection, appointment_id: Uuid) -> Result<(), AppointmentError> {
    let rows = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        [appointment_id.to_string()],
    )?;
    if rows == 0 {
        return Err(AppointmentError::NotFound(appointment_id));
    }
    Ok(())
}

/// Which owner column a listing is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Patient(Uuid),
    Professional(Uuid),
    Nothing,
}

pub fn list(
    conn: &Connection,
    scope: ListScope,
    query: &AppointmentListQuery,
) -> Result<Vec<Appointment>, AppointmentError> {
    let (patient, professional) = match scope {
        ListScope::All => (None, None),
        ListScope::Patient(id) => (Some(id.to_string()), None),
        ListScope::Professional(id) => (None, Some(id.to_string())),
        ListScope::Nothing => return Ok(Vec::new()),
    };

    let from = query
        .date_from
        .map(|date| day_bounds(date).map(|(start, _)| encode_timestamp(&start)))
        .transpose()?;
    let until = query
        .date_to
        .map(|date| day_bounds(date).map(|(_, next)| encode_timestamp(&next)))
        .transpose()?;

    let sql = format!(
        "SELECT {} FROM appointments
         WHERE (?1 IS NULL OR patient_id = ?1)
           AND (?2 IS NULL OR professional_id = ?2)
           AND (?3 IS NULL OR status = ?3)
           AND (?4 IS NULL OR start_time >= ?4)
           AND (?5 IS NULL OR start_time < ?5)
         ORDER BY start_time",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                patient,
                professional,
                query.status.map(|s| s.as_str()),
                from,
                until
            ],
            appointment_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(|row| hydrate(conn, row)).collect()
}

/// Active appointments starting within `[from, until)`.
pub fn active_starting_between(
    conn: &Connection,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    professional_id: Option<Uuid>,
    room_id: Option<Uuid>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, AppointmentError> {
    let mut stmt = conn.prepare(
        "SELECT start_time, end_time FROM appointments
         WHERE status IN ('PENDING', 'CONFIRMED')
           AND start_time >= ?1 AND start_time < ?2
           AND (?3 IS NULL OR professional_id = ?3)
           AND (?4 IS NULL OR room_id = ?4)
         ORDER BY start_time",
    )?;
    let raw = stmt
        .query_map(
            params![
                encode_timestamp(&from),
                encode_timestamp(&until),
                professional_id.map(|id| id.to_string()),
                room_id.map(|id| id.to_string()),
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    raw.iter()
        .map(|(start, end)| -> Result<_, AppointmentError> {
            Ok((decode_timestamp(start)?, decode_timestamp(end)?))
        })
        .collect()
}
