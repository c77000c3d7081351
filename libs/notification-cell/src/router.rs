use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn notification_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/{id}", get(get_notification))
        .route("/{id}/read", post(mark_read))
        .route("/{id}/sent", post(mark_sent))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
