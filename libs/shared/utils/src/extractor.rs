use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

// Middleware for authentication on customer/staff routes
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Extract token from headers
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    // Validate token
    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    // Add user to request extensions
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Shared-secret check for endpoints invoked by the external scheduler.
///
/// These routes carry no user identity, only the scheduler's bearer token.
pub fn verify_scheduler_token(token: &str, config: &AppConfig) -> Result<(), AppError> {
    if !config.is_scheduler_configured() {
        return Err(AppError::Auth("Scheduler token is not configured".to_string()));
    }

    if token != config.scheduler_api_token {
        return Err(AppError::Auth("Invalid scheduler token".to_string()));
    }

    Ok(())
}
