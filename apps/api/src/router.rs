// apps/api/src/router.rs
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use shared_config::AppConfig;

use appointment_cell::router::appointment_routes;
use booking_cell::router::slot_routes;
use recalc_cell::router::recalc_routes;

pub fn create_router(config: AppConfig) -> Router {
    let state = Arc::new(config);

    Router::new()
        .route("/", get(|| async { "Lanebook API is running!" }))
        .nest("/slots", slot_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/recalc", recalc_routes(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
