// /stayhub/services/booking-service/src/utils/mod.rs
pub mod banner;
pub mod config;
pub mod cors;
pub mod error;
pub mod health;
pub mod logger;
pub mod scheduler;
pub mod validator;
