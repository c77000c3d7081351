use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use auth_cell::router::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(config: &TestConfig) -> Router {
    auth_routes(config.to_app_state())
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn bearer_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let config = TestConfig::default();
    let app = create_test_app(&config);

    let profile = Uuid::new_v4();
    let user = TestUser::patient("test@example.com").with_profile(profile);
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));

    let response = app
        .oneshot(bearer_request("POST", "/validate", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json_response = json_body(response).await;
    assert_eq!(json_response["valid"], true);
    assert_eq!(json_response["user_id"], user.id);
    assert_eq!(json_response["email"], user.email);
    assert_eq!(json_response["role"], user.role);
    assert_eq!(json_response["profile_id"], profile.to_string());
}

#[tokio::test]
async fn test_validate_token_endpoint_unauthorized() {
    let config = TestConfig::default();

    let response = create_test_app(&config)
        .oneshot(bearer_request("POST", "/validate", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = TestUser::admin("admin@example.com");
    let expired = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);
    let response = create_test_app(&config)
        .oneshot(bearer_request("POST", "/validate", Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_token_endpoint() {
    let config = TestConfig::default();
    let user = TestUser::professional("doctor@example.com");

    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));
    let response = create_test_app(&config)
        .oneshot(bearer_request("POST", "/verify", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["valid"], true);

    let forged = JwtTestUtils::create_invalid_signature_token(&user);
    let response = create_test_app(&config)
        .oneshot(bearer_request("POST", "/verify", Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["valid"], false);
}

#[tokio::test]
async fn test_me_returns_actor_context() {
    let config = TestConfig::default();
    let profile = Uuid::new_v4();
    let user = TestUser::professional("pro@example.com").with_profile(profile);
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let response = create_test_app(&config)
        .oneshot(bearer_request("GET", "/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = json_body(response).await;
    assert_eq!(json_response["success"], true);
    assert_eq!(json_response["role"], "PROFESSIONAL");
    assert_eq!(json_response["profile_id"], profile.to_string());
    assert_eq!(json_response["is_staff"], true);
}

#[tokio::test]
async fn test_me_requires_token() {
    let config = TestConfig::default();

    let response = create_test_app(&config)
        .oneshot(bearer_request("GET", "/me", Some(&JwtTestUtils::create_malformed_token())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
