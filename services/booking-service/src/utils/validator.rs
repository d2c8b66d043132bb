// /stayhub/services/booking-service/src/utils/validator.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::BookingStatus;
use crate::utils::error::{AppError, AppResult};

/// Longest stay a single booking may cover
pub const MAX_STAY_NIGHTS: i64 = 365;

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{3}$").expect("valid regex"));

// Checkout session ids look like cs_test_a1B2c3...
static SESSION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cs_[A-Za-z0-9_]{1,250}$").expect("valid regex"));

/// Validate a stay range and return its length in nights
pub fn validate_stay_dates(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> AppResult<i64> {
    if check_in < today {
        return Err(AppError::BadRequest("Check-in date cannot be in the past".to_string()));
    }

    let nights = (check_out - check_in).num_days();
    if nights < 1 {
        return Err(AppError::BadRequest(
            "Check-out date must be after check-in date".to_string(),
        ));
    }

    if nights > MAX_STAY_NIGHTS {
        return Err(AppError::BadRequest(format!(
            "A single booking can cover at most {} nights",
            MAX_STAY_NIGHTS
        )));
    }

    Ok(nights)
}

/// Validate guest count against a listing's capacity
pub fn validate_guest_count(guests: i32, capacity: i32) -> AppResult<()> {
    if guests < 1 {
        return Err(AppError::BadRequest("At least one guest is required".to_string()));
    }
    if guests > capacity {
        return Err(AppError::BadRequest(format!(
            "This property accommodates maximum {} guests",
            capacity
        )));
    }
    Ok(())
}

/// Normalize and validate an ISO currency code
pub fn validate_currency(currency: &str) -> AppResult<String> {
    let normalized = currency.trim().to_lowercase();
    if !CURRENCY_RE.is_match(&normalized) {
        return Err(AppError::BadRequest(format!("Currency '{}' is not valid", currency)));
    }
    Ok(normalized)
}

/// Validate a checkout session id before sending it to the processor
pub fn validate_session_id(session_id: &str) -> AppResult<()> {
    if !SESSION_ID_RE.is_match(session_id) {
        return Err(AppError::BadRequest("session_id is not a valid checkout session id".to_string()));
    }
    Ok(())
}

/// Validate a status filter from a query string
pub fn validate_status_filter(status: &str) -> AppResult<BookingStatus> {
    status.parse::<BookingStatus>().map_err(AppError::BadRequest)
}

/// Validate the list tab selector
pub fn validate_tab(tab: &str) -> AppResult<()> {
    let valid_tabs = ["all", "upcoming", "pending", "confirmed", "current"];
    if !valid_tabs.contains(&tab) {
        return Err(AppError::BadRequest(format!(
            "Tab '{}' is not valid. Valid: {:?}",
            tab, valid_tabs
        )));
    }
    Ok(())
}

/// Validate pagination parameters
pub fn validate_pagination(page: u32, limit: u32) -> AppResult<(u32, u32)> {
    if page == 0 {
        return Err(AppError::BadRequest("Page starts at 1".to_string()));
    }

    if limit == 0 {
        return Err(AppError::BadRequest("Limit must be greater than 0".to_string()));
    }

    if limit > 100 {
        return Err(AppError::BadRequest("Limit is at most 100 items per page".to_string()));
    }

    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_stay_dates() {
        let today = date(2026, 3, 1);

        assert_eq!(validate_stay_dates(date(2026, 3, 1), date(2026, 3, 4), today).unwrap(), 3);
        assert!(validate_stay_dates(date(2026, 2, 28), date(2026, 3, 4), today).is_err());
        assert!(validate_stay_dates(date(2026, 3, 5), date(2026, 3, 5), today).is_err());
        assert!(validate_stay_dates(date(2026, 3, 5), date(2026, 3, 2), today).is_err());
        assert!(validate_stay_dates(date(2026, 3, 1), date(2027, 3, 2), today).is_err());
    }

    #[test]
    fn test_validate_guest_count() {
        assert!(validate_guest_count(1, 8).is_ok());
        assert!(validate_guest_count(8, 8).is_ok());
        assert!(validate_guest_count(9, 8).is_err());
        assert!(validate_guest_count(0, 8).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert_eq!(validate_currency("USD").unwrap(), "usd");
        assert_eq!(validate_currency(" eur ").unwrap(), "eur");
        assert!(validate_currency("dollars").is_err());
        assert!(validate_currency("u$d").is_err());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("cs_test_a1B2c3D4").is_ok());
        assert!(validate_session_id("pi_123").is_err());
        assert!(validate_session_id("cs_../../v1/customers").is_err());
    }

    #[test]
    fn test_validate_filters() {
        assert_eq!(validate_status_filter("confirmed").unwrap(), BookingStatus::Confirmed);
        assert!(validate_status_filter("paid").is_err());
        assert!(validate_tab("upcoming").is_ok());
        assert!(validate_tab("past").is_err());
    }

    #[test]
    fn test_validate_pagination() {
        assert!(validate_pagination(1, 10).is_ok());
        assert!(validate_pagination(0, 10).is_err());
        assert!(validate_pagination(1, 0).is_err());
        assert!(validate_pagination(1, 101).is_err());
    }
}
