// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn slot_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/available", get(handlers::get_available_slots))
        .route("/reserve", post(handlers::reserve_slot))
        .route("/release-reservation", post(handlers::release_reservation))
        .route("/confirm-reservation", post(handlers::confirm_reservation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Scheduler routes carry a shared-secret token, checked in the handler.
    let scheduler_routes = Router::new()
        .route("/cleanup-expired-reservations", post(handlers::cleanup_expired_reservations));

    Router::new()
        .merge(protected_routes)
        .merge(scheduler_routes)
        .with_state(state)
}
