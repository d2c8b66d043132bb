// /stayhub/services/booking-service/src/main.rs

mod api;
mod core;
mod middleware;
mod models;
mod repository;
mod utils;

use axum::{middleware as axum_middleware, Router};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::routes,
    core::services::*,
    middleware::{
        auth::auth_middleware,
        rate_limit::{rate_limit_middleware, RateLimiter},
    },
    repository::Repository,
    utils::{
        config::AppConfig,
        scheduler::{start_background_jobs, SchedulerMetrics},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<Repository>,
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub jwt: Arc<JwtVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub scheduler_metrics: Arc<SchedulerMetrics>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    utils::logger::init_logger();

    let config = Arc::new(AppConfig::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    info!("✅ Database connected");

    if config.run_migrations {
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("✅ Migrations applied");
    }

    let repository = Arc::new(Repository::new(pool));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeClient::from_config(&config)?);
    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("⚠️ STRIPE_WEBHOOK_SECRET not set, webhook deliveries will be rejected");
    }

    let booking_service = Arc::new(BookingService::new(repository.clone()));
    let payment_service = Arc::new(PaymentService::new(
        repository.clone(),
        gateway,
        config.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_seconds,
    ));
    rate_limiter.spawn_cleanup();

    let scheduler_metrics = SchedulerMetrics::new();
    // Held for the lifetime of the process
    let _scheduler = start_background_jobs(
        repository.clone(),
        booking_service.clone(),
        scheduler_metrics.clone(),
        config.pending_booking_ttl_hours,
    )
    .await?;

    let app_state = AppState {
        config: config.clone(),
        repository,
        booking_service,
        payment_service,
        jwt: Arc::new(JwtVerifier::from_config(&config)),
        rate_limiter,
        scheduler_metrics,
    };

    let cors = utils::cors::create_cors_layer(&config);

    // Layers run bottom-up: auth sits innermost, tracing outermost
    let app = Router::new()
        .merge(routes::create_routes())
        .with_state(app_state.clone())
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(
            middleware::security::security_headers_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(cors),
        );

    let bind_address = config.bind_address();
    utils::banner::print_startup_banner(&bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("🚀 Booking Service listening on {} ({})", bind_address, config.environment);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
