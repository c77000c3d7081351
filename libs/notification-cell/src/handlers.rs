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

use crate::models::NotificationQuery;
use crate::services::NotificationStore;

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Listing notifications for {}", actor.user_id);

    let notifications = state
        .db
        .read(move |conn| NotificationStore::list_for_actor(conn, &actor, &query))
        .await?;
    let unread = notifications.iter().filter(|n| !n.is_read()).count();

    Ok(Json(json!({
        "success": true,
        "total": notifications.len(),
        "unread": unread,
        "notifications": notifications,
    })))
}

pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .db
        .read(move |conn| NotificationStore::get(conn, &actor, notification_id))
        .await?;

    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    let notification = state
        .db
        .write(move |conn| NotificationStore::mark_read(conn, &actor, notification_id, now))
        .await?;

    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    let updated = state
        .db
        .write(move |conn| NotificationStore::mark_all_read(conn, &actor, now))
        .await?;

    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// Delivery receipt; only staff-side workers report sends.
pub async fn mark_sent(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    actor.require_staff()?;

    let now = Utc::now();
    let notification = state
        .db
        .write(move |conn| NotificationStore::mark_sent(conn, &actor, notification_id, now))
        .await?;

    Ok(Json(json!({ "success": true, "notification": notification })))
}
