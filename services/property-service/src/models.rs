// /stayhub/services/property-service/src/models.rs

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ===== DOMAIN MODELS =====

/// Listing row; `property_type` is read back as text from the enum column
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub property_type: String,
    pub location: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_per_night: Option<BigDecimal>,
    pub max_guests: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PropertyCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Hotel,
    Villa,
    Bungalow,
    Attraction,
    Apartment,
    Guesthouse,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Hotel => "hotel",
            PropertyType::Villa => "villa",
            PropertyType::Bungalow => "bungalow",
            PropertyType::Attraction => "attraction",
            PropertyType::Apartment => "apartment",
            PropertyType::Guesthouse => "guesthouse",
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hotel" => Ok(PropertyType::Hotel),
            "villa" => Ok(PropertyType::Villa),
            "bungalow" => Ok(PropertyType::Bungalow),
            "attraction" => Ok(PropertyType::Attraction),
            "apartment" => Ok(PropertyType::Apartment),
            "guesthouse" => Ok(PropertyType::Guesthouse),
            other => Err(format!("Unknown property type '{}'", other)),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub property_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub host_reply: Option<String>,
    pub host_reply_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review plus the reviewer's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewWithGuest {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_name: Option<String>,
    pub reviewer_avatar: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Default)]
pub struct ReviewStats {
    pub total_reviews: i64,
    pub average_rating: f64,
    #[sqlx(flatten)]
    pub rating_distribution: RatingDistribution,
}

#[derive(Debug, Clone, FromRow, Serialize, Default)]
pub struct RatingDistribution {
    pub five_star: i64,
    pub four_star: i64,
    pub three_star: i64,
    pub two_star: i64,
    pub one_star: i64,
}

/// Minimal booking facts needed to accept a review
#[derive(Debug, Clone, FromRow)]
pub struct ReviewableBooking {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub status: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub preferred_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller identity taken from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: String,
}

// ===== REQUEST DTOs =====

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePropertyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description is at most 5000 characters"))]
    pub description: Option<String>,

    pub property_type: String,

    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: String,

    #[validate(length(max = 500, message = "Address is at most 500 characters"))]
    pub address: Option<String>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    pub price_per_night: BigDecimal,

    #[validate(range(min = 1, max = 50, message = "Max guests must be between 1 and 50"))]
    pub max_guests: Option<i32>,

    #[validate(range(min = 0, max = 50, message = "Bedrooms must be between 0 and 50"))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 50, message = "Bathrooms must be between 0 and 50"))]
    pub bathrooms: Option<i32>,

    #[validate(length(max = 50, message = "At most 50 amenities"))]
    pub amenities: Option<Vec<String>>,

    #[validate(length(max = 10, message = "At most 10 images per property"))]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdatePropertyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description is at most 5000 characters"))]
    pub description: Option<String>,

    pub property_type: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: Option<String>,

    #[validate(length(max = 500, message = "Address is at most 500 characters"))]
    pub address: Option<String>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    pub price_per_night: Option<BigDecimal>,

    #[validate(range(min = 1, max = 50, message = "Max guests must be between 1 and 50"))]
    pub max_guests: Option<i32>,

    #[validate(range(min = 0, max = 50, message = "Bedrooms must be between 0 and 50"))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 50, message = "Bathrooms must be between 0 and 50"))]
    pub bathrooms: Option<i32>,

    #[validate(length(max = 50, message = "At most 50 amenities"))]
    pub amenities: Option<Vec<String>>,

    #[validate(length(max = 10, message = "At most 10 images per property"))]
    pub images: Option<Vec<String>>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PropertyQueryParams {
    pub q: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub guests: Option<i32>,
    pub amenities: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 2000, message = "Comment is at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyReviewRequest {
    #[validate(length(min = 1, max = 1000, message = "Reply must be 1-1000 characters"))]
    pub reply: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: Option<String>,

    #[validate(length(min = 5, max = 30, message = "Phone must be 5-30 characters"))]
    pub phone: Option<String>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,

    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(min = 2, max = 10, message = "Language code must be 2-10 characters"))]
    pub preferred_language: Option<String>,
}

// ===== RESPONSE DTOs =====

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct PaginatedPropertiesResponse {
    pub success: bool,
    pub data: Vec<Property>,
    pub pagination: PaginationMeta,
}

/// Generic `{ success, message, data }` envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
pub struct PropertyReviewsResponse {
    pub success: bool,
    pub data: Vec<ReviewWithGuest>,
    pub stats: ReviewStats,
}

#[derive(Debug, Serialize)]
pub struct UploadedImagesResponse {
    pub success: bool,
    pub message: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub details: Option<serde_json::Value>,
}

// ===== IMPLEMENTATIONS =====

impl PaginationMeta {
    pub fn new(current_page: u32, per_page: u32, total_items: i64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            ((total_items.max(0) as f64) / per_page as f64).ceil() as u32
        };

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }
}

impl PaginatedPropertiesResponse {
    pub fn success(data: Vec<Property>, pagination: PaginationMeta) -> Self {
        Self { success: true, data, pagination }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl CreatePropertyRequest {
    /// Checks the derive macros cannot express
    pub fn validate_business_rules(&self) -> Result<PropertyType, String> {
        let property_type = self.property_type.parse::<PropertyType>()?;

        if self.price_per_night <= BigDecimal::from(0) {
            return Err("Price per night must be greater than 0".to_string());
        }

        if self.title.trim().is_empty() || self.location.trim().is_empty() {
            return Err("Title and location cannot be blank".to_string());
        }

        Ok(property_type)
    }
}

impl UpdatePropertyRequest {
    pub fn validate_business_rules(&self) -> Result<Option<PropertyType>, String> {
        let property_type = self
            .property_type
            .as_deref()
            .map(str::parse::<PropertyType>)
            .transpose()?;

        if let Some(price) = &self.price_per_night {
            if *price <= BigDecimal::from(0) {
                return Err("Price per night must be greater than 0".to_string());
            }
        }

        Ok(property_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreatePropertyRequest {
        CreatePropertyRequest {
            title: "Sea View Loft".to_string(),
            description: None,
            property_type: "Villa".to_string(),
            location: "Lisbon".to_string(),
            address: None,
            latitude: Some(38.7),
            longitude: Some(-9.1),
            price_per_night: BigDecimal::from(120),
            max_guests: Some(4),
            bedrooms: Some(2),
            bathrooms: Some(1),
            amenities: Some(vec!["wifi".to_string()]),
            images: None,
        }
    }

    #[test]
    fn test_property_type_parsing() {
        assert_eq!("guesthouse".parse::<PropertyType>(), Ok(PropertyType::Guesthouse));
        assert_eq!(" HOTEL ".parse::<PropertyType>(), Ok(PropertyType::Hotel));
        assert!("castle".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let request = create_request();
        assert!(request.validate().is_ok());
        assert_eq!(request.validate_business_rules(), Ok(PropertyType::Villa));

        let mut bad = create_request();
        bad.latitude = Some(91.0);
        bad.images = Some(vec!["x".to_string(); 11]);
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("latitude"));
        assert!(errors.field_errors().contains_key("images"));

        let mut free = create_request();
        free.price_per_night = BigDecimal::from(0);
        assert!(free.validate_business_rules().is_err());
    }

    #[test]
    fn test_update_request_rules() {
        let update = UpdatePropertyRequest {
            property_type: Some("bungalow".to_string()),
            ..Default::default()
        };
        assert_eq!(update.validate_business_rules(), Ok(Some(PropertyType::Bungalow)));

        let negative = UpdatePropertyRequest {
            price_per_night: Some(BigDecimal::from(-5)),
            ..Default::default()
        };
        assert!(negative.validate_business_rules().is_err());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(2, 12, 30);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);

        let empty = PaginationMeta::new(1, 12, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_review_request_validation() {
        assert!(CreateReviewRequest { rating: 5, comment: None }.validate().is_ok());
        assert!(CreateReviewRequest { rating: 0, comment: None }.validate().is_err());
        assert!(ReplyReviewRequest { reply: String::new() }.validate().is_err());
    }
}
