// apps/api/src/main.rs
use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shared_config::AppConfig;

mod router;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanebook_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("Supabase configuration is incomplete; requests will fail");
    }
    if !config.is_scheduler_configured() {
        warn!("Scheduler token is not configured; scheduler routes will reject all calls");
    }

    let app = router::create_router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Lanebook API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
