//! Resolution of the implicit parts of a booking request.
//!
//! Everything the caller may leave out (patient, professional, room, end
//! time, initial status) is decided here, before any conflict or state
//! machine logic runs.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, warn};
use uuid::Uuid;

use resource_cell::ResourceDirectory;
use shared_models::auth::{Actor, Role};

use crate::models::{AppointmentError, AppointmentStatus, CreateAppointmentRequest, SchedulingRules};
use crate::services::lifecycle::initial_status;

/// A booking request with every reference and time fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBooking {
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub room_id: Uuid,
    pub equipment_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub treatment_type: String,
    pub notes: String,
}

pub fn resolve_booking_defaults(
    conn: &Connection,
    actor: &Actor,
    request: &CreateAppointmentRequest,
    rules: &SchedulingRules,
) -> Result<ResolvedBooking, AppointmentError> {
    let (patient_id, professional_id) = match actor.role {
        Role::Patient => {
            let profile_id = actor.profile_id.ok_or_else(|| {
                AppointmentError::Forbidden(
                    "Patient account has no linked patient profile".to_string(),
                )
            })?;
            if request.patient_id.is_some_and(|id| id != profile_id) {
                warn!(
                    "Patient {} tried to book on behalf of {:?}; using own profile",
                    actor.user_id, request.patient_id
                );
            }
            let professional_id = request.professional_id.ok_or_else(|| {
                AppointmentError::ValidationError("professional_id is required".to_string())
            })?;
            (profile_id, professional_id)
        }
        Role::Professional => {
            let patient_id = require(request.patient_id, "patient_id")?;
            let professional_id = match request.professional_id.or(actor.profile_id) {
                Some(id) => id,
                None => ResourceDirectory::professional_for_user(conn, &actor.user_id)?
                    .ok_or_else(|| {
                        AppointmentError::Forbidden(
                            "Professional account has no linked professional profile".to_string(),
                        )
                    })?,
            };
            (patient_id, professional_id)
        }
        Role::Admin => (
            require(request.patient_id, "patient_id")?,
            require(request.professional_id, "professional_id")?,
        ),
    };

    let room_id = match request.room_id {
        Some(room_id) => room_id,
        None => {
            let room = ResourceDirectory::first_active_room(conn)?
                .ok_or(AppointmentError::NoRoomsAvailable)?;
            debug!("Auto-assigned room {} ({})", room.id, room.name);
            room.id
        }
    };

    let end_time = request
        .end_time
        .unwrap_or(request.start_time + rules.default_duration);

    Ok(ResolvedBooking {
        patient_id,
        professional_id,
        room_id,
        equipment_ids: request.equipment_ids.clone(),
        start_time: request.start_time,
        end_time,
        status: initial_status(actor.role),
        treatment_type: request.treatment_type.trim().to_string(),
        notes: request.notes.clone(),
    })
}

fn require(value: Option<Uuid>, field: &str) -> Result<Uuid, AppointmentError> {
    value.ok_or_else(|| AppointmentError::ValidationError(format!("{} is required", field)))
}
