// /stayhub/services/booking-service/src/utils/banner.rs

/// Print startup banner
pub fn print_startup_banner(bind_address: &str) {
    println!(r#"
╔══════════════════════════════════════════════════════════╗
║                  BOOKING SERVICE v1.0.0                   ║
║                        StayHub                            ║
╚══════════════════════════════════════════════════════════╝
    "#);

    tracing::info!("🚀 Booking Service starting at {}", bind_address);
    tracing::info!("📋 Available endpoints:");
    tracing::info!("  Public:");
    tracing::info!("    GET  /api/properties/{{id}}/availability - Date availability");
    tracing::info!("    GET  /api/properties/{{id}}/quote        - Price quote");
    tracing::info!("    POST /api/webhooks/stripe              - Payment webhook");
    tracing::info!("  Guest:");
    tracing::info!("    POST /api/bookings                     - Create booking");
    tracing::info!("    GET  /api/bookings                     - List my bookings");
    tracing::info!("    GET  /api/bookings/stats               - My booking stats");
    tracing::info!("    GET  /api/bookings/{{id}}                - Get booking");
    tracing::info!("    PUT  /api/bookings/{{id}}/status         - Change status");
    tracing::info!("    POST /api/payments/checkout            - Create payment session");
    tracing::info!("    POST /api/payments/verify              - Verify payment");
    tracing::info!("  Host:");
    tracing::info!("    GET  /api/host/bookings                - Bookings on my listings");
    tracing::info!("    GET  /api/host/bookings/stats          - Host dashboard stats");
}
