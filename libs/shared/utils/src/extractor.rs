use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};

use shared_database::AppState;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores both the `User` and its [`Actor`]
/// in request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Missing or malformed bearer token".to_string()))?;

    let user = validate_token(bearer.token(), &state.config.jwt_secret).map_err(AppError::Auth)?;
    let actor = Actor::from_user(&user)?;

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}
