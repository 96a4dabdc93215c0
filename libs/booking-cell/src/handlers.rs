// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::verify_scheduler_token;

use appointment_cell::services::appointments::AppointmentService;
use recalc_cell::services::queue::RecalcQueueService;

use crate::models::{
    AvailableSlotsQuery, CleanupOutcome, ConfirmReservationRequest, ReleaseReservationRequest,
    ReserveSlotRequest, SlotError,
};
use crate::services::reservation::ReservationService;
use crate::services::sweeper::SweeperService;

fn map_slot_error(e: SlotError) -> AppError {
    match e {
        SlotError::NotFound => AppError::NotFound("Slot not found".to_string()),
        SlotError::Conflict(msg) => AppError::Conflict(msg),
        SlotError::Unauthorized(msg) => AppError::Auth(msg),
        SlotError::ValidationError(msg) => AppError::ValidationError(msg),
        SlotError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn reserve_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<ReserveSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReservationService::new(Arc::new(SupabaseClient::new(&state)));

    let slot = service
        .reserve_slot(
            request.slot_id,
            &request.session_id,
            request.hold_duration_minutes,
            auth.token(),
        )
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn release_reservation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<ReleaseReservationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReservationService::new(Arc::new(SupabaseClient::new(&state)));

    let released_count = service
        .release_reservation(request.slot_id, &request.session_id, auth.token())
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "success": true,
        "released_count": released_count
    })))
}

#[axum::debug_handler]
pub async fn confirm_reservation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<ConfirmReservationRequest>,
) -> Result<Json<Value>, AppError> {
    let supabase = Arc::new(SupabaseClient::new(&state));
    let service = ReservationService::new(supabase.clone());
    let appointments = AppointmentService::new(supabase.clone());
    let recalc_queue = RecalcQueueService::new(supabase);

    let appointment = service
        .confirm_reservation(&request, &appointments, &recalc_queue)
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReservationService::new(Arc::new(SupabaseClient::new(&state)));

    let slots = service
        .list_available_slots(&query, auth.token())
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "count": slots.len(),
        "slots": slots
    })))
}

/// Scheduler-invoked sweep. Always answers with a structured result; a
/// failed sweep reports its error in the body rather than a 5xx.
#[axum::debug_handler]
pub async fn cleanup_expired_reservations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    verify_scheduler_token(auth.token(), &state)?;

    let service = SweeperService::new(Arc::new(SupabaseClient::new(&state)));

    match service.cleanup_expired_reservations().await {
        Ok(CleanupOutcome::Completed { run_id, released_count, error }) => Ok(Json(json!({
            "success": error.is_none(),
            "run_id": run_id,
            "released_count": released_count,
            "error": error
        }))),
        Ok(CleanupOutcome::RateLimited) => Ok(Json(json!({
            "success": false,
            "reason": "rate_limited"
        }))),
        Err(e) => Ok(Json(json!({
            "success": false,
            "released_count": 0,
            "error": e.to_string()
        }))),
    }
}
