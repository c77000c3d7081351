use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn resource_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", get(get_room).delete(delete_room))
        .route("/equipment", get(list_equipment).post(create_equipment))
        .route("/equipment/{id}", get(get_equipment))
        .route("/patients", post(register_patient))
        .route("/patients/{id}", get(get_patient))
        .route("/professionals", post(register_professional))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
