// /stayhub/services/booking-service/src/middleware/mod.rs
pub mod auth;
pub mod rate_limit;
pub mod security;
