// /stayhub/services/booking-service/src/models.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ========================= DOMAIN MODELS =========================

/// Booking row from the bookings table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_guests: i32,
    pub total_cost: BigDecimal,
    pub status: String,
    pub payment_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Parsed status; rows are constrained by the schema so this only fails on drift
    pub fn status(&self) -> Result<BookingStatus, String> {
        self.status.parse()
    }
}

/// Booking joined with the listing it belongs to (and the guest for host views)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingWithProperty {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: Booking,
    pub property_title: Option<String>,
    pub property_location: Option<String>,
    pub property_images: Option<Vec<String>>,
    pub property_type: Option<String>,
    pub host_id: Option<Uuid>,
    pub guest_name: Option<String>,
}

/// The slice of a listing that booking and pricing need
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PropertySummary {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub price_per_night: Option<BigDecimal>,
    pub max_guests: Option<i32>,
    pub is_active: bool,
}

impl PropertySummary {
    /// Listings without an explicit capacity accept up to 8 guests
    pub const DEFAULT_MAX_GUESTS: i32 = 8;

    pub fn guest_capacity(&self) -> i32 {
        self.max_guests.unwrap_or(Self::DEFAULT_MAX_GUESTS)
    }
}

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: String,
}

// ========================= STATUS MACHINE =========================

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Edges of the lifecycle graph, independent of who asks
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(format!("Unknown booking status '{}'", other)),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is acting on a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingActor {
    Guest,
    Host,
}

// ========================= PRICING =========================

/// Price breakdown for a stay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub nights: i64,
    pub price_per_night: BigDecimal,
    pub subtotal: BigDecimal,
    pub service_fee: BigDecimal,
    pub total: BigDecimal,
}

// ========================= REQUEST DTOs =========================

/// Request to create a booking; the price is computed server-side
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,

    #[validate(range(min = 1, max = 50, message = "Guests must be between 1 and 50"))]
    pub total_guests: i32,
}

/// Request to move a booking along its lifecycle
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookingStatusRequest {
    #[validate(length(min = 1, max = 20, message = "Status is required"))]
    pub status: String,
}

/// Query parameters for booking lists
#[derive(Debug, Deserialize, Default)]
pub struct BookingQueryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub property_id: Option<Uuid>,
    pub tab: Option<String>,
    pub search: Option<String>,
}

/// Date range for availability and quote lookups
#[derive(Debug, Deserialize)]
pub struct StayQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: Option<i32>,
}

/// create-payment request body
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Property title must be 1-200 characters"))]
    pub property_title: Option<String>,

    pub amount: Option<BigDecimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,
}

/// verify-payment request body
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 255, message = "session_id is required"))]
    pub session_id: String,
    pub booking_id: Uuid,
}

// ========================= RESPONSE DTOs =========================

/// Response wrapper for a single booking
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<BookingWithProperty>,
}

/// Response wrapper for booking lists
#[derive(Debug, Serialize)]
pub struct BookingsListResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<BookingWithProperty>,
    pub pagination: Option<PaginationMeta>,
}

/// Dashboard counters for guests and hosts
#[derive(Debug, Serialize, Clone, FromRow)]
pub struct BookingStats {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub upcoming: i64,
    pub current: i64,
    pub revenue: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub property_id: Uuid,
    pub available: bool,
    pub quote: PriceQuote,
}

/// create-payment response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

/// verify-payment response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub booking_status: String,
    pub payment_status: String,
    pub session_id: String,
}

/// Metadata for pagination
#[derive(Debug, Serialize, Clone)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub details: Option<serde_json::Value>,
}

// ========================= PAYMENT PROCESSOR DTOs =========================

/// Hosted checkout session as returned by the processor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: String,
    pub status: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerList {
    pub data: Vec<ProcessorCustomer>,
}

/// Error envelope the processor returns on 4xx/5xx
#[derive(Debug, Deserialize)]
pub struct ProcessorErrorEnvelope {
    pub error: ProcessorErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ProcessorErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Webhook event envelope
#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

// ========================= HELPER IMPLEMENTATIONS =========================

impl PaginationMeta {
    /// Create pagination metadata from query results
    pub fn new(current_page: u32, per_page: u32, total_items: i64) -> Self {
        let total_pages = ((total_items as f64) / (per_page as f64)).ceil() as u32;

        Self {
            current_page,
            per_page,
            total_items,
            total_pages: if total_pages == 0 { 1 } else { total_pages },
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("pending".parse::<BookingStatus>(), Ok(BookingStatus::Pending));
        assert_eq!(" Confirmed ".parse::<BookingStatus>(), Ok(BookingStatus::Confirmed));
        assert!("paid".parse::<BookingStatus>().is_err());
        assert!("".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_lifecycle_edges() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Pending));
        for next in BookingStatus::ALL {
            assert!(!Cancelled.can_transition_to(next));
            assert!(!Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(1, 10, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(!meta.has_prev);

        let empty = PaginationMeta::new(1, 10, 0);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_checkout_session_deserializes_without_metadata() {
        let json = r#"{"id":"cs_test_1","url":null,"payment_status":"unpaid","status":"open",
            "payment_intent":null,"amount_total":1000,"currency":"usd","customer":null}"#;
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert!(session.metadata.is_empty());
    }
}
