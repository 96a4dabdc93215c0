// libs/recalc-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
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

use crate::models::{EnqueueRecalcRequest, RecalcError};
use crate::services::queue::RecalcQueueService;
use crate::services::worker::RecalcWorker;

fn map_recalc_error(e: RecalcError) -> AppError {
    match e {
        RecalcError::ValidationError(msg) => AppError::ValidationError(msg),
        RecalcError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn enqueue_recalculation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<EnqueueRecalcRequest>,
) -> Result<Json<Value>, AppError> {
    let queue = RecalcQueueService::new(Arc::new(SupabaseClient::new(&state)));

    let entry = queue
        .enqueue(request.tenant_id, request.staff_id, &request.trigger)
        .await
        .map_err(map_recalc_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

#[axum::debug_handler]
pub async fn get_queue_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let queue = RecalcQueueService::new(Arc::new(SupabaseClient::new(&state)));

    let pending = queue.pending_count().await.map_err(map_recalc_error)?;

    Ok(Json(json!({ "pending": pending })))
}

/// Scheduler-invoked batch. Partial failure is a 200 with the failures in the
/// body; only an unreachable queue makes the summary itself an error, and
/// even that comes back structured.
#[axum::debug_handler]
pub async fn process_queue(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    verify_scheduler_token(auth.token(), &state)?;

    let worker = RecalcWorker::new(Arc::new(SupabaseClient::new(&state)));

    match worker.run().await {
        Ok(summary) => Ok(Json(json!({
            "processed": summary.processed,
            "failed": summary.failed,
            "errors": summary.errors,
            "duration_ms": summary.duration_ms
        }))),
        Err(e) => Ok(Json(json!({
            "processed": 0,
            "failed": 0,
            "errors": [e.to_string()],
            "duration_ms": 0
        }))),
    }
}
