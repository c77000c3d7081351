// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use notification_cell::{AppointmentEvent, NotificationEmitter};
use shared_database::{time::storable, AppState, Database};
use shared_models::auth::{Actor, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, OccupiedSlot, SchedulingRules, TransitionOutcome,
    UpdateAppointmentRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::concurrency::check_version;
use crate::services::conflict::{ConflictDetectionService, ConflictResult};
use crate::services::defaults::resolve_booking_defaults;
use crate::services::lifecycle::{
    append_cancellation_reason, authorize_transition, ensure_visible,
};
use crate::services::repository::{self, ListScope};
use crate::services::validation::{
    ensure_references, validate_interval, validate_schedule, validate_treatment,
};

/// Orchestrates every appointment mutation.
///
/// Each public mutation is one [`Database::write`] unit of work: defaults,
/// validation, the overlap check, the persisted change and its notification
/// all run inside the same immediate transaction.
#[derive(Clone)]
pub struct AppointmentBookingService {
    db: Database,
    rules: SchedulingRules,
    emitter: NotificationEmitter,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            rules: SchedulingRules::from_config(&state.config),
            emitter: NotificationEmitter::default(),
        }
    }

    pub fn with_emitter(mut self, emitter: NotificationEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    #[instrument(skip(self, request), fields(user = %actor.user_id, role = %actor.role))]
    pub async fn create_appointment(
        &self,
        actor: Actor,
        request: CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let rules = self.rules;
        let emitter = self.emitter.clone();

        let appointment = self
            .db
            .write(move |conn| -> Result<_, AppointmentError> {
                let booking = resolve_booking_defaults(conn, &actor, &request, &rules)?;

                validate_treatment(&booking.treatment_type)?;
                validate_schedule(booking.start_time, booking.end_time, now, &rules)?;
                ensure_references(
                    conn,
                    booking.patient_id,
                    booking.professional_id,
                    booking.room_id,
                    &booking.equipment_ids,
                )?;
                ConflictDetectionService::check_conflict(
                    conn,
                    booking.professional_id,
                    Some(booking.room_id),
                    booking.start_time,
                    booking.end_time,
                    None,
                )?
                .into_result()?;

                let stamp = storable(now);
                let appointment = Appointment {
                    id: Uuid::new_v4(),
                    patient_id: booking.patient_id,
                    professional_id: booking.professional_id,
                    room_id: booking.room_id,
                    equipment_ids: booking.equipment_ids,
                    start_time: storable(booking.start_time),
                    end_time: storable(booking.end_time),
                    status: booking.status,
                    treatment_type: booking.treatment_type,
                    notes: booking.notes,
                    created_by: Some(actor.user_id.clone()),
                    version: 1,
                    created_at: stamp,
                    updated_at: stamp,
                };
                repository::insert(conn, &appointment)?;

                if actor.role == Role::Patient {
                    emitter.emit(conn, &appointment.notice(), AppointmentEvent::Requested);
                }

                repository::get(conn, appointment.id)
            })
            .await?;

        info!(
            "Booked appointment {} ({}) for patient {} with professional {}",
            appointment.id, appointment.status, appointment.patient_id, appointment.professional_id
        );
        Ok(appointment)
    }

    // ==========================================================================
    // UPDATE
    // ==========================================================================

    #[instrument(skip(self, request), fields(user = %actor.user_id, role = %actor.role))]
    pub async fn update_appointment(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let rules = self.rules;
        let emitter = self.emitter.clone();

        let appointment = self
            .db
            .write(move |conn| -> Result<_, AppointmentError> {
                let current = repository::get(conn, appointment_id)?;
                ensure_visible(&actor, &current)?;
                check_version(request.version, &current)?;

                if current.status.is_terminal() {
                    return Err(AppointmentError::InvalidTransition {
                        from: current.status,
                        to: request.status.unwrap_or(current.status),
                    });
                }

                if actor.role == Role::Patient && request.edits_details() {
                    return Err(AppointmentError::Forbidden(
                        "Patients may only cancel an appointment or edit its notes".to_string(),
                    ));
                }

                let mut next = current.clone();
                if let Some(professional_id) = request.professional_id {
                    next.professional_id = professional_id;
                }
                if let Some(room_id) = request.room_id {
                    next.room_id = room_id;
                }
                if let Some(ref equipment_ids) = request.equipment_ids {
                    let mut equipment_ids = equipment_ids.clone();
                    equipment_ids.sort();
                    equipment_ids.dedup();
                    next.equipment_ids = equipment_ids;
                }
                if let Some(start_time) = request.start_time {
                    next.start_time = storable(start_time);
                    next.end_time = storable(
                        request.end_time.unwrap_or(start_time + rules.default_duration),
                    );
                } else if let Some(end_time) = request.end_time {
                    next.end_time = storable(end_time);
                }
                if let Some(ref treatment_type) = request.treatment_type {
                    validate_treatment(treatment_type)?;
                    next.treatment_type = treatment_type.trim().to_string();
                }
                if let Some(ref notes) = request.notes {
                    next.notes = notes.clone();
                }

                let times_changed =
                    next.start_time != current.start_time || next.end_time != current.end_time;
                let resources_changed = next.professional_id != current.professional_id
                    || next.room_id != current.room_id
                    || next.equipment_ids != current.equipment_ids;

                let target = request.status.filter(|status| *status != current.status);

                if let Some(target) = target {
                    authorize_transition(&actor, &current, target, now, &rules)?;
                    next.status = target;
                    if target == AppointmentStatus::Cancelled {
                        next.notes = append_cancellation_reason(
                            &next.notes,
                            request.cancellation_reason.as_deref(),
                        );
                    }
                }

                if (times_changed || resources_changed) && next.is_active() {
                    if request.start_time.is_some() {
                        validate_schedule(next.start_time, next.end_time, now, &rules)?;
                    } else if times_changed {
                        validate_interval(next.start_time, next.end_time)?;
                    }
                    ensure_references(
                        conn,
                        next.patient_id,
                        next.professional_id,
                        next.room_id,
                        &next.equipment_ids,
                    )?;
                    ConflictDetectionService::check_conflict(
                        conn,
                        next.professional_id,
                        Some(next.room_id),
                        next.start_time,
                        next.end_time,
                        Some(next.id),
                    )?
                    .into_result()?;
                }

                let saved = repository::update(conn, &next, current.version, now)?;

                let event = match target {
                    Some(AppointmentStatus::Confirmed) => Some(AppointmentEvent::Confirmed),
                    Some(AppointmentStatus::Cancelled) => Some(AppointmentEvent::Cancelled),
                    _ if (times_changed || resources_changed) && saved.is_active() => {
                        Some(AppointmentEvent::Modified)
                    }
                    _ => None,
                };
                if let Some(event) = event {
                    emitter.emit(conn, &saved.notice(), event);
                }

                Ok(saved)
            })
            .await?;

        info!(
            "Updated appointment {} to version {} ({})",
            appointment.id, appointment.version, appointment.status
        );
        Ok(appointment)
    }

    // ==========================================================================
    // TRANSITIONS
    // ==========================================================================

    pub async fn approve(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        self.transition(actor, appointment_id, AppointmentStatus::Confirmed, None, now)
            .await
    }

    pub async fn cancel(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        self.transition(actor, appointment_id, AppointmentStatus::Cancelled, reason, now)
            .await
    }

    pub async fn complete(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        self.transition(actor, appointment_id, AppointmentStatus::Completed, None, now)
            .await
    }

    #[instrument(skip(self, reason), fields(user = %actor.user_id, role = %actor.role))]
    async fn transition(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        target: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let rules = self.rules;
        let emitter = self.emitter.clone();

        let appointment = self
            .db
            .write(move |conn| -> Result<_, AppointmentError> {
                let current = repository::get(conn, appointment_id)?;
                ensure_visible(&actor, &current)?;
                authorize_transition(&actor, &current, target, now, &rules)?;

                let mut next = current.clone();
                next.status = target;
                if target == AppointmentStatus::Cancelled {
                    next.notes = append_cancellation_reason(&next.notes, reason.as_deref());
                }
                let saved = repository::update(conn, &next, current.version, now)?;

                let event = match target {
                    AppointmentStatus::Confirmed => Some(AppointmentEvent::Confirmed),
                    AppointmentStatus::Cancelled => Some(AppointmentEvent::Cancelled),
                    AppointmentStatus::Pending | AppointmentStatus::Completed => None,
                };
                if let Some(event) = event {
                    emitter.emit(conn, &saved.notice(), event);
                }
                Ok(saved)
            })
            .await?;

        info!("Appointment {} is now {}", appointment.id, appointment.status);
        Ok(TransitionOutcome {
            status_token: status_token(target),
            appointment,
        })
    }

    // ==========================================================================
    // DELETE
    // ==========================================================================

    #[instrument(skip(self), fields(user = %actor.user_id, role = %actor.role))]
    pub async fn delete_appointment(
        &self,
        actor: Actor,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.db
            .write(move |conn| -> Result<_, AppointmentError> {
                let current = repository::get(conn, appointment_id)?;
                ensure_visible(&actor, &current)?;
                if current.start_time < now {
                    return Err(AppointmentError::HistoricalRecord);
                }
                repository::delete(conn, appointment_id)
            })
            .await?;

        info!("Deleted appointment {}", appointment_id);
        Ok(())
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        actor: Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        self.db
            .read(move |conn| -> Result<_, AppointmentError> {
                let appointment = repository::get(conn, appointment_id)?;
                ensure_visible(&actor, &appointment)?;
                Ok(appointment)
            })
            .await
    }

    pub async fn list_appointments(
        &self,
        actor: Actor,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self
            .db
            .read(move |conn| -> Result<_, AppointmentError> {
                repository::list(conn, list_scope(&actor), &query)
            })
            .await?;
        debug!("Listed {} appointments", appointments.len());
        Ok(appointments)
    }

    /// Read-only overlap probe for staff planning tools.
    pub async fn check_conflict(
        &self,
        actor: Actor,
        professional_id: Uuid,
        room_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictResult, AppointmentError> {
        if !actor.is_staff() {
            return Err(AppointmentError::Forbidden(
                "Only clinic staff may probe the schedule".to_string(),
            ));
        }
        if end <= start {
            return Err(AppointmentError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }
        self.db
            .read(move |conn| -> Result<_, AppointmentError> {
                ConflictDetectionService::check_conflict(
                    conn,
                    professional_id,
                    room_id,
                    start,
                    end,
                    exclude_appointment_id,
                )
            })
            .await
    }

    pub async fn occupied_slots(
        &self,
        date: chrono::NaiveDate,
        professional_id: Option<Uuid>,
        room_id: Option<Uuid>,
    ) -> Result<Vec<OccupiedSlot>, AppointmentError> {
        self.db
            .read(move |conn| -> Result<_, AppointmentError> {
                AvailabilityService::occupied_slots(conn, date, professional_id, room_id)
            })
            .await
    }
}

fn list_scope(actor: &Actor) -> ListScope {
    match (actor.role, actor.profile_id) {
        (Role::Admin, _) => ListScope::All,
        (Role::Patient, Some(id)) => ListScope::Patient(id),
        (Role::Professional, Some(id)) => ListScope::Professional(id),
        (Role::Patient | Role::Professional, None) => ListScope::Nothing,
    }
}

fn status_token(target: AppointmentStatus) -> &'static str {
    match target {
        AppointmentStatus::Confirmed => "approved",
        AppointmentStatus::Cancelled => "cancelled",
        AppointmentStatus::Completed => "completed",
        AppointmentStatus::Pending => "pending",
    }
}
