// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ConflictCheckRequest, AppointmentError};
use crate::services::conflict::ConflictCheckService;

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let conflict_service = ConflictCheckService::new(Arc::new(SupabaseClient::new(&state)));

    let response = conflict_service
        .check_conflicts(
            request.staff_id,
            request.start_time,
            request.end_time,
            request.exclude_appointment_id,
            token,
        )
        .await
        .map_err(|e| match e {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        })?;

    Ok(Json(json!({
        "has_conflict": response.has_conflict,
        "conflicts": response.conflicts
    })))
}
