// /stayhub/services/booking-service/src/utils/logger.rs

use tracing_subscriber::EnvFilter;

/// Logger initialization
pub fn init_logger() {
    // RUST_LOG wins; otherwise our crate and tower_http log at debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,booking_service=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
