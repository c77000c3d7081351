// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AvailabilityQuery, CancelAppointmentRequest, ConflictCheckQuery,
    CreateAppointmentRequest, TransitionOutcome, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// CRUD
// ==============================================================================

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .create_appointment(actor, request, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_appointments(actor, query).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .get_appointment(actor, appointment_id)
        .await?;

    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_appointment(actor, appointment_id, request, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    booking_service
        .delete_appointment(actor, appointment_id, Utc::now())
        .await?;

    Ok(Json(json!({ "success": true, "deleted": appointment_id })))
}

// ==============================================================================
// TRANSITIONS
// ==============================================================================

fn transition_response(outcome: TransitionOutcome) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": outcome.status_token,
        "appointment": outcome.appointment,
    }))
}

pub async fn approve_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let outcome = booking_service
        .approve(actor, appointment_id, Utc::now())
        .await?;
    Ok(transition_response(outcome))
}

/// The body is optional; an empty POST cancels without a reason.
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CancelAppointmentRequest::default()
    } else {
        serde_json::from_slice::<CancelAppointmentRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid cancel request: {}", e)))?
    };

    let booking_service = AppointmentBookingService::new(&state);
    let outcome = booking_service
        .cancel(actor, appointment_id, request.reason, Utc::now())
        .await?;
    Ok(transition_response(outcome))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let outcome = booking_service
        .complete(actor, appointment_id, Utc::now())
        .await?;
    Ok(transition_response(outcome))
}

// ==============================================================================
// SCHEDULE QUERIES
// ==============================================================================

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let date = query
        .date
        .ok_or_else(|| AppError::BadRequest("The date parameter is required".to_string()))?;
    debug!("Availability for {} (professional {:?}, room {:?})", date, query.professional_id, query.room_id);

    let booking_service = AppointmentBookingService::new(&state);
    let occupied_slots = booking_service
        .occupied_slots(date, query.professional_id, query.room_id)
        .await?;

    Ok(Json(json!({
        "date": date,
        "occupied_slots": occupied_slots,
    })))
}

pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let result = booking_service
        .check_conflict(
            actor,
            query.professional_id,
            query.room_id,
            query.start_time,
            query.end_time,
            query.exclude_appointment_id,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "has_conflict": result.has_conflict(),
        "conflict": result,
    })))
}
