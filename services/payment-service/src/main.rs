// /flight-booking/services/payment-service/src/main.rs

use flight_payment_service::{
    build_router,
    utils::{banner, config::AppConfig, logger},
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    logger::init_logger();

    let config = AppConfig::from_env()?;
    let bind_address = config.bind_address();

    let state = AppState::from_config(config).await?;
    let cache_backend = if state.cache_manager.is_using_redis() { "redis" } else { "in-memory" };

    let app = build_router(state);

    banner::print_startup_banner(&bind_address, cache_backend);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("🚀 Flight Payment Service berjalan di {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
