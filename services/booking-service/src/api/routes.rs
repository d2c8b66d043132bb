// /stayhub/services/booking-service/src/api/routes.rs

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers;
use crate::AppState;

/// All booking service routes
pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Public listing helpers
        .route("/api/properties/{id}/availability", get(handlers::check_availability))
        .route("/api/properties/{id}/quote", get(handlers::get_quote))

        // Guest bookings
        .route("/api/bookings", post(handlers::create_booking).get(handlers::list_my_bookings))
        .route("/api/bookings/stats", get(handlers::guest_stats))
        .route("/api/bookings/{id}", get(handlers::get_booking))
        .route("/api/bookings/{id}/status", put(handlers::update_booking_status))

        // Host dashboard
        .route("/api/host/bookings", get(handlers::list_host_bookings))
        .route("/api/host/bookings/stats", get(handlers::host_stats))

        // Payments
        .route("/api/payments/checkout", post(handlers::create_payment))
        .route("/api/payments/verify", post(handlers::verify_payment))

        // Processor webhook (public, signature-checked)
        .route("/api/webhooks/stripe", post(handlers::handle_stripe_webhook))

        .route("/health", get(handlers::health_check))
        .fallback(handlers::not_found)
}
