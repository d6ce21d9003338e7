// /flight-booking/services/payment-service/src/utils/cors.rs

use std::time::Duration;
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use crate::utils::config::AppConfig;

/// Setup CORS layer dari config
pub fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = parse_origins(&config.allowed_origins, config.is_production());

    let layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .allow_credentials(true);

    if config.is_production() {
        layer
            .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
            .max_age(Duration::from_secs(86400))
    } else {
        layer.max_age(Duration::from_secs(3600))
    }
}

/// Parse origins. Production hanya menerima https.
fn parse_origins(origins: &[String], production: bool) -> Vec<HeaderValue> {
    origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !production || origin.starts_with("https://"))
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(header) => {
                tracing::debug!("CORS origin registered: {}", origin);
                Some(header)
            }
            Err(e) => {
                tracing::warn!("Invalid origin format '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn allowed_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]
}

/// Explicit list, wajib kalau credentials diizinkan
fn allowed_headers() -> Vec<HeaderName> {
    vec![
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::ACCEPT_LANGUAGE,
        HeaderName::from_static("x-guest-session"),
    ]
}
