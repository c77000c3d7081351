use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use notification_cell::router::notification_routes;
use resource_cell::router::resource_routes;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/resources", resource_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/notifications", notification_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use shared_utils::test_utils::{TestClinic, TestConfig};

    #[tokio::test]
    async fn test_liveness() {
        let state = TestConfig::default().to_app_state();
        let response = create_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cells_are_mounted_behind_auth() {
        let clinic = TestClinic::seeded().await;
        let token = clinic.token_for(&clinic.admin);

        for uri in ["/appointments", "/resources/rooms", "/notifications", "/auth/me"] {
            let response = create_router(clinic.state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

            let response = create_router(clinic.state.clone())
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .header("authorization", format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }
}
