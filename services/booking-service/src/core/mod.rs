// /stayhub/services/booking-service/src/core/mod.rs

pub mod booking;
pub mod jwt;
pub mod payment;
pub mod stripe;

pub mod services {
    pub use super::booking::BookingService;
    pub use super::jwt::JwtVerifier;
    pub use super::payment::PaymentService;
    pub use super::stripe::{PaymentGateway, StripeClient};
}
