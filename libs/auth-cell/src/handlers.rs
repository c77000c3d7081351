use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::HeaderMap,
    Extension,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::{json, Value};
use tracing::debug;

use shared_database::AppState;
use shared_models::auth::{Actor, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|bearer| bearer.token().to_string())
        .ok_or_else(|| AppError::Auth("Missing or malformed bearer token".to_string()))
}

pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = jwt::validate_token(&token, &state.config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
        profile_id: user.profile_id,
    }))
}

pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = jwt::validate_token(&token, &state.config.jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

/// The caller as the scheduling core sees them.
pub async fn current_actor(
    Extension(user): Extension<User>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    debug!("Resolving actor context for user: {}", user.id);

    Ok(Json(json!({
        "success": true,
        "user_id": actor.user_id,
        "email": user.email,
        "role": actor.role,
        "profile_id": actor.profile_id,
        "is_staff": actor.is_staff(),
    })))
}
