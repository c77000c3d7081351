// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_models::auth::{Actor, Role};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SchedulingRules};

/// Statuses reachable in one step from `status`.
pub fn valid_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    match status {
        AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
        AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        // Terminal states - no transitions allowed
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub fn is_terminal(status: AppointmentStatus) -> bool {
    valid_transitions(status).is_empty()
}

/// Status a freshly booked appointment starts in.
pub fn initial_status(role: Role) -> AppointmentStatus {
    match role {
        Role::Patient => AppointmentStatus::Pending,
        Role::Professional | Role::Admin => AppointmentStatus::Confirmed,
    }
}

/// Whether the actor can see (and therefore act on) the appointment at all.
pub fn is_visible_to(actor: &Actor, appointment: &Appointment) -> bool {
    match actor.role {
        Role::Patient => actor.profile_id == Some(appointment.patient_id),
        Role::Professional => actor.profile_id == Some(appointment.professional_id),
        Role::Admin => true,
    }
}

pub fn ensure_visible(actor: &Actor, appointment: &Appointment) -> Result<(), AppointmentError> {
    if is_visible_to(actor, appointment) {
        Ok(())
    } else {
        debug!(
            "Appointment {} is outside the scope of {} ({})",
            appointment.id, actor.user_id, actor.role
        );
        Err(AppointmentError::NotFound(appointment.id))
    }
}

/// Patient cancellations need at least `rules.cancellation_notice` before start.
pub fn check_cancellation_window(
    appointment: &Appointment,
    now: DateTime<Utc>,
    rules: &SchedulingRules,
) -> Result<(), AppointmentError> {
    if appointment.start_time - now >= rules.cancellation_notice {
        Ok(())
    } else {
        Err(AppointmentError::CancellationWindowViolation {
            notice_hours: rules.cancellation_notice.num_hours(),
        })
    }
}

/// Gate a status change on the transition table and the actor's role.
pub fn authorize_transition(
    actor: &Actor,
    appointment: &Appointment,
    target: AppointmentStatus,
    now: DateTime<Utc>,
    rules: &SchedulingRules,
) -> Result<(), AppointmentError> {
    let from = appointment.status;

    if is_terminal(from) {
        warn!("Transition attempted on terminal appointment {}: {} -> {}", appointment.id, from, target);
        return Err(AppointmentError::InvalidTransition { from, to: target });
    }

    match actor.role {
        Role::Patient => {
            if target != AppointmentStatus::Cancelled {
                return Err(AppointmentError::Forbidden(
                    "A patient may only cancel their appointment".to_string(),
                ));
            }
            if actor.profile_id != Some(appointment.patient_id) {
                return Err(AppointmentError::Forbidden(
                    "Patients may only cancel their own appointments".to_string(),
                ));
            }
            ensure_listed(from, target)?;
            check_cancellation_window(appointment, now, rules)?;
        }
        Role::Professional | Role::Admin => ensure_listed(from, target)?,
    }

    debug!("Transition authorised for {}: {} -> {}", appointment.id, from, target);
    Ok(())
}

fn ensure_listed(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), AppointmentError> {
    if valid_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidTransition { from, to })
    }
}

/// Append a cancellation reason below the existing notes, never replacing them.
pub fn append_cancellation_reason(notes: &str, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{}\n\nCancelación: {}", notes, reason)
            .trim()
            .to_string(),
        None => notes.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus, start: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            equipment_ids: vec![],
            start_time: start,
            end_time: start + Duration::hours(1),
            status,
            treatment_type: "Masaje".to_string(),
            notes: String::new(),
            created_by: None,
            version: 1,
            created_at: start,
            updated_at: start,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            valid_transitions(AppointmentStatus::Pending),
            &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
        );
        assert!(is_terminal(AppointmentStatus::Completed));
        assert!(is_terminal(AppointmentStatus::Cancelled));
        assert!(!is_terminal(AppointmentStatus::Confirmed));
        assert_eq!(initial_status(Role::Patient), AppointmentStatus::Pending);
        assert_eq!(initial_status(Role::Admin), AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_cancellation_window_boundary() {
        let rules = SchedulingRules::default();
        let mut appt = appointment(AppointmentStatus::Confirmed, now() + Duration::hours(24));
        let patient = Actor::new("u", Role::Patient, Some(appt.patient_id));

        assert!(authorize_transition(&patient, &appt, AppointmentStatus::Cancelled, now(), &rules).is_ok());

        appt.start_time = now() + Duration::hours(23) + Duration::minutes(59);
        assert_matches!(
            authorize_transition(&patient, &appt, AppointmentStatus::Cancelled, now(), &rules),
            Err(AppointmentError::CancellationWindowViolation { notice_hours: 24 })
        );

        let admin = Actor::new("a", Role::Admin, None);
        assert!(authorize_transition(&admin, &appt, AppointmentStatus::Cancelled, now(), &rules).is_ok());
    }

    #[test]
    fn test_patient_role_gating() {
        let rules = SchedulingRules::default();
        let appt = appointment(AppointmentStatus::Pending, now() + Duration::days(3));
        let owner = Actor::new("u", Role::Patient, Some(appt.patient_id));
        let stranger = Actor::new("v", Role::Patient, Some(Uuid::new_v4()));
        let admin = Actor::new("a", Role::Admin, None);

        assert_matches!(
            authorize_transition(&owner, &appt, AppointmentStatus::Confirmed, now(), &rules),
            Err(AppointmentError::Forbidden(_))
        );
        assert_matches!(
            authorize_transition(&stranger, &appt, AppointmentStatus::Cancelled, now(), &rules),
            Err(AppointmentError::Forbidden(_))
        );
        assert!(authorize_transition(&admin, &appt, AppointmentStatus::Confirmed, now(), &rules).is_ok());
    }

    #[test]
    fn test_terminal_and_skipped_transitions() {
        let rules = SchedulingRules::default();
        let staff = Actor::new("p", Role::Professional, None);

        let done = appointment(AppointmentStatus::Completed, now() + Duration::days(1));
        assert_matches!(
            authorize_transition(&staff, &done, AppointmentStatus::Cancelled, now(), &rules),
            Err(AppointmentError::InvalidTransition { .. })
        );

        let pending = appointment(AppointmentStatus::Pending, now() + Duration::days(1));
        assert_matches!(
            authorize_transition(&staff, &pending, AppointmentStatus::Completed, now(), &rules),
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::Pending,
                to: AppointmentStatus::Completed
            })
        );
    }

    #[test]
    fn test_visibility_scopes() {
        let appt = appointment(AppointmentStatus::Pending, now());
        assert!(is_visible_to(&Actor::new("a", Role::Admin, None), &appt));
        assert!(is_visible_to(
            &Actor::new("p", Role::Professional, Some(appt.professional_id)),
            &appt
        ));
        assert!(!is_visible_to(&Actor::new("p", Role::Professional, None), &appt));
        assert_matches!(
            ensure_visible(&Actor::new("x", Role::Patient, Some(Uuid::new_v4())), &appt),
            Err(AppointmentError::NotFound(_))
        );
    }

    #[test]
    fn test_cancellation_reason_appending() {
        assert_eq!(
            append_cancellation_reason("Traer informe", Some("patient ill")),
            "Traer informe\n\nCancelación: patient ill"
        );
        assert_eq!(
            append_cancellation_reason("", Some("patient ill")),
            "Cancelación: patient ill"
        );
        assert_eq!(append_cancellation_reason("keep", Some("   ")), "keep");
        assert_eq!(append_cancellation_reason("keep", None), "keep");
    }
}
