// /stayhub/services/booking-service/src/utils/cors.rs

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::utils::config::AppConfig;

/// Setup CORS layer for the booking service
pub fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_production() {
        build_production_cors(&config.allowed_origins)
    } else {
        build_development_cors(&config.allowed_origins)
    }
}

/// Build CORS configuration for development
fn build_development_cors(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_origins(origins, false))
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build CORS configuration for production, https origins only
fn build_production_cors(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_origins(origins, true))
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(86400))
}

/// Turn configured origins into header values, skipping malformed ones
fn parse_origins(origins: &[String], https_only: bool) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter(|origin| !https_only || origin.starts_with("https://"))
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!("CORS origin registered: {}", origin);
                Some(value)
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

/// Explicit list; wildcards are not allowed together with credentials
fn allowed_headers() -> Vec<header::HeaderName> {
    vec![
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::USER_AGENT,
        header::CACHE_CONTROL,
        header::HeaderName::from_static("x-client-info"),
        header::HeaderName::from_static("apikey"),
    ]
}
