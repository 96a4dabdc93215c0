// libs/recalc-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn recalc_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/enqueue", post(handlers::enqueue_recalculation))
        .route("/queue/stats", get(handlers::get_queue_stats))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Scheduler routes carry a shared-secret token, checked in the handler.
    let scheduler_routes = Router::new()
        .route("/process-queue", get(handlers::process_queue));

    Router::new()
        .merge(protected_routes)
        .merge(scheduler_routes)
        .with_state(state)
}
