use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{
    CreateEquipmentRequest, CreateRoomRequest, EquipmentQuery, RegisterPatientRequest,
    RegisterProfessionalRequest, RoomQuery,
};
use crate::services::ResourceDirectory;

// ==============================================================================
// ROOMS
// ==============================================================================

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Listing rooms (active_only: {})", query.active_only);

    let rooms = state
        .db
        .read(move |conn| ResourceDirectory::list_rooms(conn, query.active_only))
        .await?;

    Ok(Json(json!({
        "success": true,
        "total": rooms.len(),
        "rooms": rooms,
    })))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let room = state
        .db
        .read(move |conn| ResourceDirectory::get_room(conn, room_id))
        .await?;

    Ok(Json(json!({ "success": true, "room": room })))
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin()?;

    let now = Utc::now();
    let room = state
        .db
        .write(move |conn| ResourceDirectory::create_room(conn, &request, now))
        .await?;

    Ok(Json(json!({
        "success": true,
        "room": room,
        "message": "Room created",
    })))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin()?;

    state
        .db
        .write(move |conn| ResourceDirectory::delete_room(conn, room_id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Room deleted",
    })))
}

// ==============================================================================
// EQUIPMENT
// ==============================================================================

pub async fn list_equipment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EquipmentQuery>,
) -> Result<Json<Value>, AppError> {
    let equipment = state
        .db
        .read(move |conn| ResourceDirectory::list_equipment(conn, &query))
        .await?;

    Ok(Json(json!({
        "success": true,
        "total": equipment.len(),
        "equipment": equipment,
    })))
}

pub async fn get_equipment(
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let equipment = state
        .db
        .read(move |conn| ResourceDirectory::get_equipment(conn, equipment_id))
        .await?;

    Ok(Json(json!({ "success": true, "equipment": equipment })))
}

pub async fn create_equipment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateEquipmentRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin()?;

    let now = Utc::now();
    let equipment = state
        .db
        .write(move |conn| ResourceDirectory::create_equipment(conn, &request, now))
        .await?;

    Ok(Json(json!({
        "success": true,
        "equipment": equipment,
        "message": "Equipment registered",
    })))
}

// ==============================================================================
// PROFILES
// ==============================================================================

pub async fn register_patient(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin()?;

    let now = Utc::now();
    let profile = state
        .db
        .write(move |conn| ResourceDirectory::register_patient(conn, &request, now))
        .await?;

    Ok(Json(json!({ "success": true, "patient": profile })))
}

pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let own_profile = actor.profile_id == Some(patient_id);
    if !own_profile {
        actor.require_staff()?;
    }

    let profile = state
        .db
        .read(move |conn| ResourceDirectory::get_patient(conn, patient_id))
        .await?;

    Ok(Json(json!({ "success": true, "patient": profile })))
}

pub async fn register_professional(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterProfessionalRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin()?;

    let now = Utc::now();
    let profile = state
        .db
        .write(move |conn| ResourceDirectory::register_professional(conn, &request, now))
        .await?;

    Ok(Json(json!({ "success": true, "professional": profile })))
}

