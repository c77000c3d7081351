// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route(
            "/",
            post(handlers::create_appointment).get(handlers::list_appointments),
        )
        .route("/availability", get(handlers::get_availability))
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/approve", post(handlers::approve_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
