// /flight-booking/services/payment-service/src/lib.rs

pub mod api;
pub mod core;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod utils;

use std::sync::Arc;
use axum::{middleware as axum_middleware, Router};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use crate::{
    core::services::*,
    middleware::auth::{auth_middleware, JwtVerifier},
    repository::{CacheGuestBookingRepository, CacheRefundLedger, HttpBookingStore},
    utils::{cache::CacheManager, config::AppConfig, error::AppResult},
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub return_processor: Arc<GatewayReturnProcessor>,
    pub guest_cache: Arc<GuestBookingCache>,
    pub cache_manager: CacheManager,
    pub jwt: Arc<JwtVerifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire semua komponen production dari config
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let bookings = Arc::new(HttpBookingStore::new(
            &config.booking_service_url,
            config.backend_timeout,
        )?);

        let codec = ConfirmationCodeCodec::new(&config.confirmation_prefix, config.reference_max_len)?;

        let cache_manager = CacheManager::connect_or_fallback(&config.redis_url, "flight_payment").await;

        let gateway = Arc::new(VnpayClient::new(config.gateway.clone())?);
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            bookings.clone(),
            gateway,
            Arc::new(CacheRefundLedger::new(cache_manager.clone(), config.refund_ledger_ttl)),
            codec,
            config.gateway.offset()?,
        ));

        let return_processor = Arc::new(GatewayReturnProcessor::new(
            config.gateway.hash_secret.clone(),
            config.gateway.tmn_code.clone(),
        ));

        let guest_cache = Arc::new(GuestBookingCache::new(
            Arc::new(CacheGuestBookingRepository::new(cache_manager.clone(), config.guest_ttl)),
            bookings,
            config.guest_capacity,
        ));

        Ok(Self {
            orchestrator,
            return_processor,
            guest_cache,
            cache_manager,
            jwt: Arc::new(JwtVerifier::new(&config.jwt_secret)),
            config: Arc::new(config),
        })
    }
}

/// Router lengkap dengan middleware stack
pub fn build_router(state: AppState) -> Router {
    let cors = utils::cors::create_cors_layer(&state.config);
    let request_timeout = state.config.request_timeout;

    Router::new()
        .merge(api::routes::create_routes())
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                // Request tracing (paling luar)
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors),
        )
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Security headers juga untuk response 401/403 dari auth
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::security::security_headers_middleware,
        ))
}
