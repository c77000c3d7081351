//! Identity and status lookups for rooms, equipment and registered profiles.
//!
//! Every function takes a borrowed [`Connection`] so callers can run it inside
//! their own unit of work (the booking transaction in particular).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{parse_uuid, time::decode_timestamp, time::encode_timestamp};

use crate::models::{
    CreateEquipmentRequest, CreateRoomRequest, Equipment, EquipmentQuery, EquipmentRow,
    EquipmentStatus, PatientProfile, ProfessionalProfile, RegisterPatientRequest,
    RegisterProfessionalRequest, ResourceError, Room, RoomRow, RoomStatus,
};

const ROOM_COLUMNS: &str = "id, name, description, status, is_active, created_at";
const EQUIPMENT_COLUMNS: &str =
    "id, name, description, room_id, status, serial_number, is_active, created_at, updated_at";

fn room_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn equipment_row(row: &Row<'_>) -> rusqlite::Result<EquipmentRow> {
    Ok(EquipmentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        room_id: row.get(3)?,
        status: row.get(4)?,
        serial_number: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn exists(conn: &Connection, sql: &str, id: Uuid) -> Result<bool, ResourceError> {
    let found: Option<i64> = conn
        .query_row(sql, [id.to_string()], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub struct ResourceDirectory;

impl ResourceDirectory {
    // ==========================================================================
    // ROOMS
    // ==========================================================================

    /// First active room by creation order, then name.
    pub fn first_active_room(conn: &Connection) -> Result<Option<Room>, ResourceError> {
        let sql = format!(
            "SELECT {} FROM rooms WHERE is_active = 1 ORDER BY created_at, name LIMIT 1",
            ROOM_COLUMNS
        );
        let row = conn.query_row(&sql, [], room_row).optional()?;
        Ok(row.map(Room::try_from).transpose()?)
    }

    pub fn get_room(conn: &Connection, room_id: Uuid) -> Result<Room, ResourceError> {
        let sql = format!("SELECT {} FROM rooms WHERE id = ?1", ROOM_COLUMNS);
        let row = conn
            .query_row(&sql, [room_id.to_string()], room_row)
            .optional()?
            .ok_or_else(|| ResourceError::NotFound(format!("Room {}", room_id)))?;
        Ok(Room::try_from(row)?)
    }

    pub fn room_exists(conn: &Connection, room_id: Uuid) -> Result<bool, ResourceError> {
        exists(conn, "SELECT 1 FROM rooms WHERE id = ?1", room_id)
    }

    pub fn list_rooms(conn: &Connection, active_only: bool) -> Result<Vec<Room>, ResourceError> {
        let sql = format!(
            "SELECT {} FROM rooms WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
            ROOM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([active_only], room_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(Room::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn create_room(
        conn: &Connection,
        request: &CreateRoomRequest,
        now: DateTime<Utc>,
    ) -> Result<Room, ResourceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ResourceError::Validation("Room name is required".to_string()));
        }

        let room = Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: request.description.clone(),
            status: request.status.unwrap_or(RoomStatus::Available),
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
        };

        conn.execute(
            "INSERT INTO rooms (id, name, description, status, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                room.id.to_string(),
                room.name,
                room.description,
                room.status.as_str(),
                room.is_active,
                encode_timestamp(&room.created_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ResourceError::Duplicate(format!("Room named {}", room.name))
            } else {
                e.into()
            }
        })?;

        info!("Created room {} ({})", room.name, room.id);
        Ok(room)
    }

    /// Rooms referenced by any appointment, past or present, cannot be removed.
    pub fn delete_room(conn: &Connection, room_id: Uuid) -> Result<(), ResourceError> {
        if !Self::room_exists(conn, room_id)? {
            return Err(ResourceError::NotFound(format!("Room {}", room_id)));
        }

        let references: i64 = conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE room_id = ?1",
            [room_id.to_string()],
            |row| row.get(0),
        )?;
        if references > 0 {
            debug!("Room {} has {} appointments, refusing delete", room_id, references);
            return Err(ResourceError::InUse(format!("Room {}", room_id)));
        }

        conn.execute("DELETE FROM rooms WHERE id = ?1", [room_id.to_string()])?;
        info!("Deleted room {}", room_id);
        Ok(())
    }

    // ==========================================================================
    // EQUIPMENT
    // ==========================================================================

    pub fn get_equipment(conn: &Connection, equipment_id: Uuid) -> Result<Equipment, ResourceError> {
        let sql = format!("SELECT {} FROM equipment WHERE id = ?1", EQUIPMENT_COLUMNS);
        let row = conn
            .query_row(&sql, [equipment_id.to_string()], equipment_row)
            .optional()?
            .ok_or_else(|| ResourceError::NotFound(format!("Equipment {}", equipment_id)))?;
        Ok(Equipment::try_from(row)?)
    }

    pub fn list_equipment(
        conn: &Connection,
        query: &EquipmentQuery,
    ) -> Result<Vec<Equipment>, ResourceError> {
        let sql = format!(
            "SELECT {} FROM equipment
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR room_id = ?2)
             ORDER BY name",
            EQUIPMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    query.status.map(|s| s.as_str()),
                    query.room_id.map(|r| r.to_string()),
                ],
                equipment_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(Equipment::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn create_equipment(
        conn: &Connection,
        request: &CreateEquipmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Equipment, ResourceError> {
        if request.name.trim().is_empty() {
            return Err(ResourceError::Validation("Equipment name is required".to_string()));
        }
        if let Some(room_id) = request.room_id {
            if !Self::room_exists(conn, room_id)? {
                return Err(ResourceError::NotFound(format!("Room {}", room_id)));
            }
        }

        let equipment = Equipment {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            room_id: request.room_id,
            status: request.status.unwrap_or(EquipmentStatus::Available),
            serial_number: request.serial_number.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let stamp = encode_timestamp(&now);
        conn.execute(
            "INSERT INTO equipment
                (id, name, description, room_id, status, serial_number, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            params![
                equipment.id.to_string(),
                equipment.name,
                equipment.description,
                equipment.room_id.map(|r| r.to_string()),
                equipment.status.as_str(),
                equipment.serial_number,
                stamp,
            ],
        )?;

        info!("Registered equipment {} ({})", equipment.name, equipment.id);
        Ok(equipment)
    }

    /// Fails with the first id that does not resolve to an equipment row.
    pub fn ensure_equipment_exists(conn: &Connection, ids: &[Uuid]) -> Result<(), ResourceError> {
        for id in ids {
            if !exists(conn, "SELECT 1 FROM equipment WHERE id = ?1", *id)? {
                return Err(ResourceError::NotFound(format!("Equipment {}", id)));
            }
        }
        Ok(())
    }

    // ==========================================================================
    // PROFILES
    // ==========================================================================

    pub fn patient_exists(conn: &Connection, patient_id: Uuid) -> Result<bool, ResourceError> {
        exists(conn, "SELECT 1 FROM patient_profiles WHERE id = ?1", patient_id)
    }

    pub fn professional_exists(
        conn: &Connection,
        professional_id: Uuid,
    ) -> Result<bool, ResourceError> {
        exists(
            conn,
            "SELECT 1 FROM professional_profiles WHERE id = ?1",
            professional_id,
        )
    }

    /// Professional profile linked to an upstream user id.
    pub fn professional_for_user(
        conn: &Connection,
        user_id: &str,
    ) -> Result<Option<Uuid>, ResourceError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT id FROM professional_profiles WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.as_deref().map(parse_uuid).transpose()?)
    }

    pub fn register_patient(
        conn: &Connection,
        request: &RegisterPatientRequest,
        now: DateTime<Utc>,
    ) -> Result<PatientProfile, ResourceError> {
        if request.user_id.trim().is_empty() || request.full_name.trim().is_empty() {
            return Err(ResourceError::Validation(
                "user_id and full_name are required".to_string(),
            ));
        }

        let profile = PatientProfile {
            id: Uuid::new_v4(),
            user_id: request.user_id.trim().to_string(),
            full_name: request.full_name.trim().to_string(),
            created_at: now,
        };

        conn.execute(
            "INSERT INTO patient_profiles (id, user_id, full_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.id.to_string(),
                profile.user_id,
                profile.full_name,
                encode_timestamp(&now),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ResourceError::Duplicate(format!("Patient profile for user {}", profile.user_id))
            } else {
                e.into()
            }
        })?;

        info!("Registered patient profile {}", profile.id);
        Ok(profile)
    }

    pub fn register_professional(
        conn: &Connection,
        request: &RegisterProfessionalRequest,
        now: DateTime<Utc>,
    ) -> Result<ProfessionalProfile, ResourceError> {
        if request.user_id.trim().is_empty() || request.full_name.trim().is_empty() {
            return Err(ResourceError::Validation(
                "user_id and full_name are required".to_string(),
            ));
        }

        let profile = ProfessionalProfile {
            id: Uuid::new_v4(),
            user_id: request.user_id.trim().to_string(),
            full_name: request.full_name.trim().to_string(),
            specialty: request.specialty.trim().to_string(),
            created_at: now,
        };

        conn.execute(
            "INSERT INTO professional_profiles (id, user_id, full_name, specialty, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.to_string(),
                profile.user_id,
                profile.full_name,
                profile.specialty,
                encode_timestamp(&now),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ResourceError::Duplicate(format!(
                    "Professional profile for user {}",
                    profile.user_id
                ))
            } else {
                e.into()
            }
        })?;

        info!("Registered professional profile {}", profile.id);
        Ok(profile)
    }

    pub fn get_patient(conn: &Connection, patient_id: Uuid) -> Result<PatientProfile, ResourceError> {
        let (id, user_id, full_name, created_at): (String, String, String, String) = conn
            .query_row(
                "SELECT id, user_id, full_name, created_at FROM patient_profiles WHERE id = ?1",
                [patient_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
            .ok_or_else(|| ResourceError::NotFound(format!("Patient {}", patient_id)))?;

        Ok(PatientProfile {
            id: parse_uuid(&id)?,
            user_id,
            full_name,
            created_at: decode_timestamp(&created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use shared_database::{Database, DbError};

    async fn with_conn<T, F>(f: F) -> Result<T, ResourceError>
    where
        F: FnOnce(&Connection) -> Result<T, ResourceError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Database::open_in_memory().map_err(ResourceError::from)?;
        db.write(f).await
    }

    fn room_request(name: &str) -> CreateRoomRequest {
        CreateRoomRequest {
            name: name.to_string(),
            description: String::new(),
            status: None,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn test_first_active_room_skips_inactive() {
        let first = with_conn(|conn| {
            let now = Utc::now();
            let mut closed = room_request("Sala A");
            closed.is_active = Some(false);
            ResourceDirectory::create_room(conn, &closed, now)?;
            ResourceDirectory::create_room(conn, &room_request("Sala C"), now + Duration::seconds(1))?;
            ResourceDirectory::create_room(conn, &room_request("Sala B"), now + Duration::seconds(2))?;
            ResourceDirectory::first_active_room(conn)
        })
        .await
        .unwrap();

        assert_eq!(first.map(|r| r.name), Some("Sala C".to_string()));
    }

    #[tokio::test]
    async fn test_no_rooms_yields_none() {
        let first = with_conn(ResourceDirectory::first_active_room).await.unwrap();
        assert!(first.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_room_name_rejected() {
        let result = with_conn(|conn| {
            ResourceDirectory::create_room(conn, &room_request("Sala 1"), Utc::now())?;
            ResourceDirectory::create_room(conn, &room_request("Sala 1"), Utc::now())
        })
        .await;
        assert_matches!(result, Err(ResourceError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_equipment_filters_and_existence() {
        let (in_room, broken, missing) = with_conn(|conn| {
            let now = Utc::now();
            let room = ResourceDirectory::create_room(conn, &room_request("Sala 1"), now)?;
            let laser = ResourceDirectory::create_equipment(
                conn,
                &CreateEquipmentRequest {
                    name: "Láser".to_string(),
                    description: String::new(),
                    room_id: Some(room.id),
                    status: None,
                    serial_number: "L-1".to_string(),
                },
                now,
            )?;
            ResourceDirectory::create_equipment(
                conn,
                &CreateEquipmentRequest {
                    name: "Ultrasonidos".to_string(),
                    description: String::new(),
                    room_id: None,
                    status: Some(EquipmentStatus::OutOfService),
                    serial_number: String::new(),
                },
                now,
            )?;

            let in_room = ResourceDirectory::list_equipment(
                conn,
                &EquipmentQuery { status: None, room_id: Some(room.id) },
            )?;
            let broken = ResourceDirectory::list_equipment(
                conn,
                &EquipmentQuery { status: Some(EquipmentStatus::OutOfService), room_id: None },
            )?;
            let missing =
                ResourceDirectory::ensure_equipment_exists(conn, &[laser.id, Uuid::new_v4()]);
            Ok((in_room, broken, missing))
        })
        .await
        .unwrap();

        assert_eq!(in_room.len(), 1);
        assert_eq!(in_room[0].name, "Láser");
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].status, EquipmentStatus::OutOfService);
        assert_matches!(missing, Err(ResourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_profiles_register_and_resolve() {
        let (professional, resolved, patient_known, duplicate) = with_conn(|conn| {
            let now = Utc::now();
            let professional = ResourceDirectory::register_professional(
                conn,
                &RegisterProfessionalRequest {
                    user_id: "user-pro".to_string(),
                    full_name: "Luis".to_string(),
                    specialty: "Fisioterapia".to_string(),
                },
                now,
            )?;
            let patient = ResourceDirectory::register_patient(
                conn,
                &RegisterPatientRequest {
                    user_id: "user-pat".to_string(),
                    full_name: "Ana".to_string(),
                },
                now,
            )?;
            let resolved = ResourceDirectory::professional_for_user(conn, "user-pro")?;
            let patient_known = ResourceDirectory::patient_exists(conn, patient.id)?;
            let duplicate = ResourceDirectory::register_patient(
                conn,
                &RegisterPatientRequest {
                    user_id: "user-pat".to_string(),
                    full_name: "Ana again".to_string(),
                },
                now,
            );
            Ok((professional, resolved, patient_known, duplicate))
        })
        .await
        .unwrap();

        assert_eq!(resolved, Some(professional.id));
        assert!(patient_known);
        assert_matches!(duplicate, Err(ResourceError::Duplicate(_)));
    }

    #[test]
    fn test_error_mapping() {
        use shared_models::error::AppError;

        assert_matches!(
            AppError::from(ResourceError::InUse("Room".into())),
            AppError::Conflict(_)
        );
        assert_matches!(
            AppError::from(ResourceError::Database(DbError::Poisoned)),
            AppError::Database(_)
        );
    }
}
