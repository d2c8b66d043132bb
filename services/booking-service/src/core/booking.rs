// /stayhub/services/booking-service/src/core/booking.rs

use std::sync::Arc;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    models::*,
    repository::{
        booking::{BookingListFilter, BookingRepository, ListScope, NewBooking},
        Repository,
    },
    utils::{
        error::{AppError, AppResult},
        validator,
    },
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Round a money amount to cents
pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Price a stay: nights x nightly rate plus a 10% service fee
pub fn quote_stay(price_per_night: &BigDecimal, nights: i64) -> AppResult<PriceQuote> {
    if nights < 1 {
        return Err(AppError::BadRequest("A stay must be at least one night".to_string()));
    }
    if price_per_night <= &BigDecimal::from(0) {
        return Err(AppError::BadRequest("Property has no valid nightly price".to_string()));
    }

    let subtotal = round_money(&(price_per_night * BigDecimal::from(nights)));
    let service_fee = round_money(&(&subtotal / BigDecimal::from(10)));
    let total = &subtotal + &service_fee;

    Ok(PriceQuote {
        nights,
        price_per_night: round_money(price_per_night),
        subtotal,
        service_fee,
        total,
    })
}

/// Decide whether `actor` may move a booking from `from` to `to`
pub fn authorize_transition(
    actor: BookingActor,
    from: BookingStatus,
    to: BookingStatus,
    check_out: NaiveDate,
    today: NaiveDate,
) -> AppResult<()> {
    if from.is_terminal() {
        return Err(AppError::BadRequest(format!("Booking is already {}", from)));
    }

    if !from.can_transition_to(to) {
        return Err(AppError::BadRequest(format!(
            "Booking cannot change from '{}' to '{}'",
            from, to
        )));
    }

    match (actor, from, to) {
        (BookingActor::Guest, BookingStatus::Pending, BookingStatus::Cancelled) => Ok(()),
        (BookingActor::Host, BookingStatus::Pending, BookingStatus::Confirmed)
        | (BookingActor::Host, BookingStatus::Pending, BookingStatus::Cancelled)
        | (BookingActor::Host, BookingStatus::Confirmed, BookingStatus::Cancelled) => Ok(()),
        (BookingActor::Host, BookingStatus::Confirmed, BookingStatus::Completed) => {
            if check_out < today {
                Ok(())
            } else {
                Err(AppError::BadRequest(
                    "A booking can only be completed after check-out".to_string(),
                ))
            }
        }
        (actor, from, to) => Err(AppError::Forbidden(format!(
            "A {:?} cannot change a booking from '{}' to '{}'",
            actor, from, to
        ))),
    }
}

/// Which side of a booking the caller is on
pub fn actor_for(user_id: Uuid, guest_id: Uuid, host_id: Option<Uuid>) -> AppResult<BookingActor> {
    if user_id == guest_id {
        Ok(BookingActor::Guest)
    } else if host_id == Some(user_id) {
        Ok(BookingActor::Host)
    } else {
        Err(AppError::Forbidden("Access denied for this booking".to_string()))
    }
}

/// Booking lifecycle business logic
pub struct BookingService {
    repository: Arc<Repository>,
}

impl BookingService {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    /// Availability of a listing for a date range
    pub async fn availability(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> AppResult<bool> {
        if check_out <= check_in {
            return Err(AppError::BadRequest(
                "Check-out date must be after check-in date".to_string(),
            ));
        }

        self.repository
            .property()
            .find_summary(property_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

        self.repository
            .booking()
            .check_availability_now(property_id, check_in, check_out)
            .await
    }

    /// Price quote plus current availability
    pub async fn quote(
        &self,
        property_id: Uuid,
        stay: &StayQuery,
        today: NaiveDate,
    ) -> AppResult<(PriceQuote, bool)> {
        let nights = validator::validate_stay_dates(stay.check_in, stay.check_out, today)?;

        let property = self.repository
            .property()
            .find_summary(property_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

        if let Some(guests) = stay.guests {
            validator::validate_guest_count(guests, property.guest_capacity())?;
        }

        let price = property.price_per_night.as_ref().ok_or_else(|| {
            AppError::BadRequest("Property has no nightly price".to_string())
        })?;
        let quote = quote_stay(price, nights)?;

        let available = self.repository
            .booking()
            .check_availability_now(property_id, stay.check_in, stay.check_out)
            .await?;

        Ok((quote, available))
    }

    /// Create a pending booking with a server-computed price
    pub async fn create_booking(
        &self,
        guest: &AuthUser,
        request: &CreateBookingRequest,
        today: NaiveDate,
    ) -> AppResult<BookingWithProperty> {
        let nights = validator::validate_stay_dates(
            request.check_in_date,
            request.check_out_date,
            today,
        )?;

        let mut tx = self.repository.begin_transaction().await?;

        let property = self.repository
            .property()
            .lock_for_booking(&mut tx, request.property_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

        if property.host_id == guest.id {
            return Err(AppError::BadRequest("You cannot book your own property".to_string()));
        }

        validator::validate_guest_count(request.total_guests, property.guest_capacity())?;

        let price = property.price_per_night.as_ref().ok_or_else(|| {
            AppError::BadRequest("Property has no nightly price".to_string())
        })?;
        let quote = quote_stay(price, nights)?;

        // Re-checked under the listing lock so two guests cannot take the same nights
        let available = BookingRepository::check_availability(
            &mut *tx,
            property.id,
            request.check_in_date,
            request.check_out_date,
        )
        .await?;

        if !available {
            return Err(AppError::Conflict(
                "Property is not available for the selected dates".to_string(),
            ));
        }

        let booking = self.repository
            .booking()
            .insert(
                &mut tx,
                &NewBooking {
                    property_id: property.id,
                    guest_id: guest.id,
                    check_in_date: request.check_in_date,
                    check_out_date: request.check_out_date,
                    total_guests: request.total_guests,
                    total_cost: quote.total.clone(),
                },
            )
            .await?;

        self.repository
            .audit()
            .log_booking_created(&mut tx, guest.id, booking.id, &booking.total_cost)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Booking {} created by guest {} for property {} ({} nights, total {})",
            booking.id, guest.id, property.id, nights, quote.total
        );

        self.load(booking.id).await
    }

    /// One booking, visible to its guest and the listing's host
    pub async fn get_booking(&self, user: &AuthUser, booking_id: Uuid) -> AppResult<BookingWithProperty> {
        let booking = self.load(booking_id).await?;

        if let Err(e) = actor_for(user.id, booking.booking.guest_id, booking.host_id) {
            tracing::warn!("User {} attempted to access booking {}", user.id, booking_id);
            return Err(e);
        }

        Ok(booking)
    }

    /// Apply a lifecycle transition requested by a guest or host
    pub async fn update_status(
        &self,
        user: &AuthUser,
        booking_id: Uuid,
        requested: &str,
        today: NaiveDate,
    ) -> AppResult<BookingWithProperty> {
        let target: BookingStatus = requested.parse().map_err(AppError::BadRequest)?;

        let mut tx = self.repository.begin_transaction().await?;

        let booking = self.repository
            .booking()
            .find_for_update(&mut tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let host_id = self.repository
            .property()
            .find_summary(booking.property_id)
            .await?
            .map(|p| p.host_id);

        let actor = actor_for(user.id, booking.guest_id, host_id)?;
        let current = booking.status().map_err(AppError::Internal)?;

        authorize_transition(actor, current, target, booking.check_out_date, today)?;

        self.repository
            .booking()
            .update_status_if(&mut tx, booking_id, current, target)
            .await?
            .ok_or_else(|| AppError::Conflict("Booking was modified concurrently".to_string()))?;

        self.repository
            .audit()
            .log_status_changed(&mut tx, Some(user.id), booking_id, current, target, "user")
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Booking {} moved {} -> {} by {:?} {}",
            booking_id, current, target, actor, user.id
        );

        self.load(booking_id).await
    }

    /// Paginated bookings for a guest or host
    pub async fn list(
        &self,
        scope: ListScope,
        params: &BookingQueryParams,
        today: NaiveDate,
    ) -> AppResult<(Vec<BookingWithProperty>, PaginationMeta)> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let (page, limit) = validator::validate_pagination(page, limit)?;

        let filter = build_list_filter(params)?;

        let (bookings, total) = self.repository
            .booking()
            .list(scope, &filter, today, page, limit)
            .await?;

        Ok((bookings, PaginationMeta::new(page, limit, total)))
    }

    pub async fn stats(&self, scope: ListScope, today: NaiveDate) -> AppResult<BookingStats> {
        self.repository.booking().stats(scope, today).await
    }

    /// Cancel pending bookings nobody paid for in time
    pub async fn expire_stale_pending(&self, ttl_hours: i64) -> AppResult<usize> {
        let mut tx = self.repository.begin_transaction().await?;
        let expired = self.repository.booking().cancel_stale_pending(&mut tx, ttl_hours).await?;

        for booking_id in &expired {
            self.repository
                .audit()
                .log_status_changed(
                    &mut tx,
                    None,
                    *booking_id,
                    BookingStatus::Pending,
                    BookingStatus::Cancelled,
                    "expiry",
                )
                .await?;
        }
        tx.commit().await?;

        Ok(expired.len())
    }

    async fn load(&self, booking_id: Uuid) -> AppResult<BookingWithProperty> {
        self.repository
            .booking()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}

/// Validate raw query parameters into repository filters
pub fn build_list_filter(params: &BookingQueryParams) -> AppResult<BookingListFilter> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "all")
        .map(validator::validate_status_filter)
        .transpose()?;

    if let Some(tab) = params.tab.as_deref() {
        validator::validate_tab(tab)?;
    }

    Ok(BookingListFilter {
        status,
        property_id: params.property_id,
        tab: params.tab.clone(),
        search: params.search.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_quote_adds_ten_percent_fee() {
        let quote = quote_stay(&money("120"), 3).unwrap();
        assert_eq!(quote.nights, 3);
        assert_eq!(quote.subtotal, money("360.00"));
        assert_eq!(quote.service_fee, money("36.00"));
        assert_eq!(quote.total, money("396.00"));
    }

    #[test]
    fn test_quote_rounds_to_cents() {
        let quote = quote_stay(&money("99.99"), 1).unwrap();
        assert_eq!(quote.service_fee, money("10.00"));
        assert_eq!(quote.total, money("109.99"));
    }

    #[test]
    fn test_quote_rejects_bad_input() {
        assert!(quote_stay(&money("100"), 0).is_err());
        assert!(quote_stay(&money("0"), 2).is_err());
    }

    #[test]
    fn test_guest_may_only_cancel_pending() {
        let today = date(2026, 6, 1);
        let out = date(2026, 6, 10);

        assert!(authorize_transition(BookingActor::Guest, BookingStatus::Pending, BookingStatus::Cancelled, out, today).is_ok());
        assert!(matches!(
            authorize_transition(BookingActor::Guest, BookingStatus::Pending, BookingStatus::Confirmed, out, today),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_transition(BookingActor::Guest, BookingStatus::Confirmed, BookingStatus::Cancelled, out, today),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_host_transitions() {
        let today = date(2026, 6, 1);
        let future_out = date(2026, 6, 10);
        let past_out = date(2026, 5, 30);

        assert!(authorize_transition(BookingActor::Host, BookingStatus::Pending, BookingStatus::Confirmed, future_out, today).is_ok());
        assert!(authorize_transition(BookingActor::Host, BookingStatus::Pending, BookingStatus::Cancelled, future_out, today).is_ok());
        assert!(authorize_transition(BookingActor::Host, BookingStatus::Confirmed, BookingStatus::Cancelled, future_out, today).is_ok());
        assert!(authorize_transition(BookingActor::Host, BookingStatus::Confirmed, BookingStatus::Completed, past_out, today).is_ok());
        assert!(matches!(
            authorize_transition(BookingActor::Host, BookingStatus::Confirmed, BookingStatus::Completed, future_out, today),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let today = date(2026, 6, 1);
        let out = date(2026, 5, 1);
        for actor in [BookingActor::Guest, BookingActor::Host] {
            for target in BookingStatus::ALL {
                assert!(matches!(
                    authorize_transition(actor, BookingStatus::Cancelled, target, out, today),
                    Err(AppError::BadRequest(_))
                ));
                assert!(authorize_transition(actor, BookingStatus::Completed, target, out, today).is_err());
            }
        }
    }

    #[test]
    fn test_actor_resolution() {
        let guest = Uuid::new_v4();
        let host = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert_eq!(actor_for(guest, guest, Some(host)).unwrap(), BookingActor::Guest);
        assert_eq!(actor_for(host, guest, Some(host)).unwrap(), BookingActor::Host);
        assert!(matches!(actor_for(stranger, guest, Some(host)), Err(AppError::Forbidden(_))));
        assert!(actor_for(host, guest, None).is_err());
    }

    #[test]
    fn test_build_list_filter() {
        let params = BookingQueryParams {
            status: Some("all".to_string()),
            tab: Some("upcoming".to_string()),
            ..Default::default()
        };
        let filter = build_list_filter(&params).unwrap();
        assert!(filter.status.is_none());
        assert_eq!(filter.tab.as_deref(), Some("upcoming"));

        let bad = BookingQueryParams {
            status: Some("paid".to_string()),
            ..Default::default()
        };
        assert!(build_list_filter(&bad).is_err());
    }
}
