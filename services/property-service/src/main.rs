// /stayhub/services/property-service/src/main.rs
mod auth;
mod cache;
mod config;
mod database;
mod error;
mod handlers;
mod models;
mod upload;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::JwtVerifier;
use cache::CacheManager;
use config::AppConfig;
use error::{AppError, AppResult};
use handlers::*;
use upload::{ImageUploader, MAX_FILES_PER_REQUEST, MAX_IMAGE_BYTES};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtVerifier>,
    pub cache: CacheManager,
    pub uploader: Arc<ImageUploader>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logger();

    if let Err(e) = run().await {
        tracing::error!("❌ Property service failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("✅ Database connected successfully");

    if config.run_migrations {
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        info!("✅ Migrations applied");
    }

    let cache = CacheManager::connect_or_fallback(config.redis_url.as_deref(), "property_service").await;
    let uploader = Arc::new(ImageUploader::from_config(&config)?);

    let state = AppState {
        db: pool,
        jwt: Arc::new(JwtVerifier::from_config(&config)),
        config: Arc::new(config),
        cache,
        uploader,
    };

    let app = build_router(state.clone());
    let bind_address = state.config.bind_address();
    print_startup_banner(&bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| AppError::Configuration(format!("Failed to bind {}: {}", bind_address, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("👋 Property service stopped");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    // Multipart framing on top of the per-file cap
    let upload_body_limit = MAX_IMAGE_BYTES * MAX_FILES_PER_REQUEST + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        // Properties
        .route("/api/properties", get(search_properties).post(create_property))
        .route(
            "/api/properties/{id}",
            get(get_property).put(update_property).delete(delete_property),
        )
        .route("/api/properties/{id}/reviews", get(get_property_reviews))
        .route("/api/host/properties", get(list_host_properties))
        .route("/api/categories", get(get_categories))
        // Images
        .route(
            "/api/upload/images",
            post(upload_images).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/api/upload/images/{user_id}/{file_name}", delete(delete_image))
        // Reviews
        .route("/api/bookings/{booking_id}/review", post(create_review))
        .route("/api/reviews/{id}/reply", post(reply_to_review))
        // Profiles
        .route("/api/profile", get(get_profile).put(upsert_profile))
        // Stored images
        .nest_service("/storage", ServeDir::new(&state.config.storage_base_path))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(create_cors_layer(&state.config)),
        )
        .with_state(state)
}

fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,property_service=debug,tower_http=debug"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn security_headers(req: Request, next: Next) -> Response {
    let private = req.uri().path().starts_with("/api/profile") || req.uri().path().starts_with("/api/host");

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));

    if private {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, private"));
    }

    response
}

fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|origin| !config.is_production() || origin.starts_with("https://"))
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Invalid origin format '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

fn print_startup_banner(bind_address: &str) {
    println!(r#"
╔══════════════════════════════════════════════════════════╗
║                 PROPERTY SERVICE v1.0.0                   ║
║                        StayHub                            ║
╚══════════════════════════════════════════════════════════╝
    "#);

    info!("🚀 Property Service starting on {}", bind_address);
    info!("📋 Available endpoints:");
    info!("  GET    /api/properties                     - Search listings");
    info!("  GET    /api/properties/{{id}}                - Listing detail");
    info!("  GET    /api/properties/{{id}}/reviews        - Reviews and rating stats");
    info!("  GET    /api/categories                     - Categories");
    info!("  POST   /api/properties                     - Create listing");
    info!("  PUT    /api/properties/{{id}}                - Update listing");
    info!("  DELETE /api/properties/{{id}}                - Delete or deactivate listing");
    info!("  GET    /api/host/properties                - My listings");
    info!("  POST   /api/upload/images                  - Upload listing images");
    info!("  DELETE /api/upload/images/{{user}}/{{file}}    - Delete an image");
    info!("  POST   /api/bookings/{{id}}/review           - Review a completed stay");
    info!("  POST   /api/reviews/{{id}}/reply             - Host reply");
    info!("  GET    /api/profile                        - My profile");
    info!("  PUT    /api/profile                        - Save my profile");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("🛑 Shutdown signal received");
}
