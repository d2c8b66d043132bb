// /stayhub/services/booking-service/src/core/payment.rs

use std::sync::Arc;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    core::booking::round_money,
    models::*,
    repository::Repository,
    utils::{
        config::AppConfig,
        error::{AppError, AppResult},
        validator,
    },
};

use super::stripe::{verify_webhook_signature, CheckoutSessionParams, PaymentGateway};

pub const DEFAULT_CURRENCY: &str = "usd";

/// Webhook events that carry a checkout session
const SESSION_EVENTS: [&str; 4] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
    "checkout.session.async_payment_failed",
    "checkout.session.expired",
];

/// Convert a money amount into the processor's minor units (cents)
pub fn to_minor_units(amount: &BigDecimal) -> AppResult<i64> {
    let cents = (amount * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp);

    match cents.to_i64() {
        Some(value) if value > 0 => Ok(value),
        _ => Err(AppError::BadRequest(format!("Amount {} cannot be charged", amount))),
    }
}

/// Target booking status for a processor payment status, if the move is legal
pub fn resolve_verification(current: BookingStatus, payment_status: &str) -> Option<BookingStatus> {
    let target = match payment_status {
        "paid" => BookingStatus::Confirmed,
        "unpaid" => BookingStatus::Cancelled,
        _ => return None,
    };

    if current == target {
        return None;
    }

    // An abandoned or failed session only releases a booking that was never paid
    let legal = match target {
        BookingStatus::Cancelled => current == BookingStatus::Pending,
        _ => current.can_transition_to(target),
    };

    if !legal {
        tracing::warn!(
            "Ignoring payment status '{}' for booking in status '{}'",
            payment_status, current
        );
        return None;
    }

    Some(target)
}

/// Payment outcome implied by a webhook event type
pub fn webhook_outcome<'a>(event_type: &str, session: &'a CheckoutSession) -> Option<&'a str> {
    match event_type {
        "checkout.session.completed" if session.payment_status == "paid" => Some("paid"),
        "checkout.session.async_payment_succeeded" => Some("paid"),
        "checkout.session.async_payment_failed" | "checkout.session.expired" => Some("unpaid"),
        _ => None,
    }
}

/// What a verified webhook delivery should do to its booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction<'a> {
    /// The event id was seen before
    Duplicate,
    Settle(Uuid, &'a str),
    NoBooking,
    NoChange,
}

pub fn webhook_action(
    first_delivery: bool,
    booking_id: Option<Uuid>,
    outcome: Option<&str>,
) -> WebhookAction<'_> {
    match (first_delivery, booking_id, outcome) {
        (false, _, _) => WebhookAction::Duplicate,
        (true, Some(id), Some(outcome)) => WebhookAction::Settle(id, outcome),
        (true, None, _) => WebhookAction::NoBooking,
        (true, Some(_), None) => WebhookAction::NoChange,
    }
}

/// Payment status stored on the booking after a move to `target`
pub fn recorded_payment_status(target: BookingStatus, payment_status: &str) -> Option<&str> {
    (target == BookingStatus::Confirmed).then_some(payment_status)
}

/// Build the checkout request for a pending booking
pub fn checkout_params(
    booking: &BookingWithProperty,
    user: &AuthUser,
    fallback_title: Option<&str>,
    currency: String,
    customer: Option<String>,
    origin: &str,
) -> AppResult<CheckoutSessionParams> {
    let title = booking
        .property_title
        .as_deref()
        .or(fallback_title)
        .unwrap_or("Property");
    let booking_id = booking.booking.id.to_string();

    Ok(CheckoutSessionParams {
        booking_id: booking_id.clone(),
        user_id: user.id.to_string(),
        product_name: format!("Booking: {}", title),
        description: format!("Booking reservation for {}", title),
        unit_amount: to_minor_units(&booking.booking.total_cost)?,
        currency,
        customer_email: if customer.is_none() { user.email.clone() } else { None },
        customer,
        success_url: format!(
            "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}&booking_id={}",
            origin, booking_id
        ),
        cancel_url: format!("{}/payment-canceled?booking_id={}", origin, booking_id),
    })
}

/// Checkout, verification and webhook processing
pub struct PaymentService {
    repository: Arc<Repository>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl PaymentService {
    pub fn new(
        repository: Arc<Repository>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self { repository, gateway, config }
    }

    /// Open a hosted checkout page for the caller's pending booking
    pub async fn create_checkout(
        &self,
        user: &AuthUser,
        request: &CreatePaymentRequest,
        request_origin: Option<&str>,
    ) -> AppResult<CheckoutResponse> {
        let booking = self.repository
            .booking()
            .find_by_id(request.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.booking.guest_id != user.id {
            tracing::warn!("User {} tried to pay for booking {}", user.id, booking.booking.id);
            return Err(AppError::NotFound("Booking not found".to_string()));
        }

        let status = booking.booking.status().map_err(AppError::Internal)?;
        if status != BookingStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "Only pending bookings can be paid, this one is '{}'",
                status
            )));
        }

        if let Some(amount) = &request.amount {
            if round_money(amount) != round_money(&booking.booking.total_cost) {
                return Err(AppError::BadRequest(format!(
                    "Amount {} does not match booking total {}",
                    amount, booking.booking.total_cost
                )));
            }
        }

        let currency = validator::validate_currency(
            request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
        )?;

        let customer = match user.email.as_deref() {
            Some(email) => match self.gateway.find_customer_by_email(email).await {
                Ok(found) => found.map(|c| c.id),
                Err(e) => {
                    tracing::warn!("Customer lookup failed, falling back to email: {}", e);
                    None
                }
            },
            None => None,
        };

        let origin = self.config.checkout_origin(request_origin);
        let params = checkout_params(
            &booking,
            user,
            request.property_title.as_deref(),
            currency,
            customer,
            &origin,
        )?;

        let session = self.gateway.create_checkout_session(&params).await?;
        let url = session.url.clone().ok_or_else(|| {
            AppError::ExternalService("Checkout session has no redirect url".to_string())
        })?;

        let mut tx = self.repository.begin_transaction().await?;
        self.repository.payment().set_session(&mut tx, booking.booking.id, &session.id).await?;
        self.repository
            .audit()
            .log_checkout_created(&mut tx, user.id, booking.booking.id, &session.id)
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Checkout session {} created for booking {} ({} {})",
            session.id, booking.booking.id, params.unit_amount, params.currency
        );

        Ok(CheckoutResponse { url, session_id: session.id })
    }

    /// Reconcile a booking with the processor's view of its checkout session
    pub async fn verify_payment(
        &self,
        user: &AuthUser,
        request: &VerifyPaymentRequest,
    ) -> AppResult<VerifyPaymentResponse> {
        validator::validate_session_id(&request.session_id)?;

        let booking = self.repository
            .booking()
            .find_by_id(request.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.booking.guest_id != user.id {
            return Err(AppError::Forbidden("Access denied for this booking".to_string()));
        }

        let session = self.gateway.retrieve_checkout_session(&request.session_id).await?;
        ensure_session_matches(&session, request.booking_id)?;

        let mut tx = self.repository.begin_transaction().await?;
        let booking_status = self
            .settle(&mut tx, request.booking_id, &session.payment_status, &session, Some(user.id), "verification")
            .await?;
        tx.commit().await?;

        Ok(VerifyPaymentResponse {
            success: true,
            booking_status: booking_status.to_string(),
            payment_status: session.payment_status,
            session_id: session.id,
        })
    }

    /// Handle a signed processor webhook; duplicate deliveries are no-ops
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> AppResult<()> {
        let secret = self.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
            AppError::Configuration("STRIPE_WEBHOOK_SECRET is not configured".to_string())
        })?;
        let signature = signature
            .ok_or_else(|| AppError::Unauthorized("Missing Stripe-Signature header".to_string()))?;

        verify_webhook_signature(payload, signature, secret, now)?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        if !SESSION_EVENTS.contains(&event.event_type.as_str()) {
            tracing::debug!("Ignoring webhook event {} ({})", event.id, event.event_type);
            return Ok(());
        }

        let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
            .map_err(|e| AppError::BadRequest(format!("Malformed checkout session: {}", e)))?;

        let booking_id = match session
            .metadata
            .get("booking_id")
            .and_then(|id| Uuid::parse_str(id).ok())
        {
            Some(id) => Some(id),
            // Sessions opened elsewhere may lack metadata; fall back to the stored session id
            None => self.repository
                .payment()
                .find_by_session(&session.id)
                .await?
                .map(|b| b.id),
        };

        let mut tx = self.repository.begin_transaction().await?;

        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;
        let first_delivery = self.repository
            .payment()
            .record_event(&mut tx, &event.id, &event.event_type, booking_id, raw)
            .await?;

        match webhook_action(first_delivery, booking_id, webhook_outcome(&event.event_type, &session)) {
            WebhookAction::Duplicate => {
                tracing::info!("Webhook event {} already processed", event.id);
                return Ok(());
            }
            WebhookAction::Settle(booking_id, outcome) => {
                if self.repository.booking().find_by_id(booking_id).await?.is_none() {
                    tracing::warn!("Webhook event {} references unknown booking {}", event.id, booking_id);
                } else {
                    let status = self
                        .settle(&mut tx, booking_id, outcome, &session, None, "webhook")
                        .await?;
                    tracing::info!("Webhook {} left booking {} as '{}'", event.event_type, booking_id, status);
                }
            }
            WebhookAction::NoBooking => {
                tracing::warn!("Webhook event {} matches no booking", event.id);
            }
            WebhookAction::NoChange => {
                tracing::debug!("Webhook event {} needs no booking change", event.id);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Apply a payment status to a locked booking; returns the resulting status
    async fn settle(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        payment_status: &str,
        session: &CheckoutSession,
        actor: Option<Uuid>,
        source: &str,
    ) -> AppResult<BookingStatus> {
        let booking = self.repository
            .booking()
            .find_for_update(tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let current = booking.status().map_err(AppError::Internal)?;

        let Some(target) = resolve_verification(current, payment_status) else {
            return Ok(current);
        };

        self.repository
            .payment()
            .apply_outcome(
                tx,
                booking_id,
                current,
                target,
                session.payment_intent.as_deref(),
                recorded_payment_status(target, payment_status),
            )
            .await?
            .ok_or_else(|| AppError::Conflict("Booking was modified concurrently".to_string()))?;

        self.repository
            .audit()
            .log_status_changed(tx, actor, booking_id, current, target, source)
            .await?;

        tracing::info!(
            "Booking {} moved {} -> {} from {} of session {}",
            booking_id, current, target, source, session.id
        );

        Ok(target)
    }
}

/// A session tagged with a booking id must have been opened for this booking
pub fn ensure_session_matches(session: &CheckoutSession, booking_id: Uuid) -> AppResult<()> {
    let expected = booking_id.to_string();
    match session.metadata.get("booking_id") {
        None => Ok(()),
        Some(id) if *id == expected => Ok(()),
        Some(_) => {
            tracing::warn!("Session {} does not belong to booking {}", session.id, booking_id);
            Err(AppError::BadRequest("Checkout session does not belong to this booking".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stripe::sign_webhook_payload;
    use crate::utils::config::test_config;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::collections::HashMap;
    use std::str::FromStr;

    struct FakeGateway;

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn find_customer_by_email(&self, _email: &str) -> AppResult<Option<ProcessorCustomer>> {
            Ok(None)
        }

        async fn create_checkout_session(&self, params: &CheckoutSessionParams) -> AppResult<CheckoutSession> {
            Ok(session("cs_test_fake", "unpaid", &params.booking_id))
        }

        async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
            Ok(session(session_id, "paid", ""))
        }
    }

    fn session(id: &str, payment_status: &str, booking_id: &str) -> CheckoutSession {
        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), booking_id.to_string());
        CheckoutSession {
            id: id.to_string(),
            url: Some(format!("https://checkout.stripe.com/c/{}", id)),
            payment_status: payment_status.to_string(),
            status: None,
            payment_intent: Some("pi_123".to_string()),
            amount_total: None,
            currency: Some("usd".to_string()),
            customer: None,
            metadata,
        }
    }

    fn booking_with_property(total: &str) -> BookingWithProperty {
        BookingWithProperty {
            booking: Booking {
                id: Uuid::new_v4(),
                property_id: Uuid::new_v4(),
                guest_id: Uuid::new_v4(),
                check_in_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
                check_out_date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
                total_guests: 2,
                total_cost: BigDecimal::from_str(total).unwrap(),
                status: "pending".to_string(),
                payment_session_id: None,
                payment_intent_id: None,
                payment_status: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            property_title: Some("Sea View Loft".to_string()),
            property_location: None,
            property_images: None,
            property_type: None,
            host_id: Some(Uuid::new_v4()),
            guest_name: None,
        }
    }

    fn service() -> PaymentService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stayhub_test")
            .unwrap();
        PaymentService::new(
            Arc::new(Repository::new(pool)),
            Arc::new(FakeGateway),
            Arc::new(test_config()),
        )
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(&BigDecimal::from_str("396.00").unwrap()).unwrap(), 39600);
        assert_eq!(to_minor_units(&BigDecimal::from_str("10.005").unwrap()).unwrap(), 1001);
        assert!(to_minor_units(&BigDecimal::from(0)).is_err());
    }

    #[test]
    fn test_resolve_verification() {
        assert_eq!(resolve_verification(BookingStatus::Pending, "paid"), Some(BookingStatus::Confirmed));
        assert_eq!(resolve_verification(BookingStatus::Pending, "unpaid"), Some(BookingStatus::Cancelled));
        assert_eq!(resolve_verification(BookingStatus::Pending, "no_payment_required"), None);
        // repeated verification is a no-op
        assert_eq!(resolve_verification(BookingStatus::Confirmed, "paid"), None);
        // a late payment never revives a cancelled booking
        assert_eq!(resolve_verification(BookingStatus::Cancelled, "paid"), None);
        assert_eq!(resolve_verification(BookingStatus::Completed, "unpaid"), None);
        // a stale session expiring never cancels a paid booking
        assert_eq!(resolve_verification(BookingStatus::Confirmed, "unpaid"), None);
    }

    #[test]
    fn test_webhook_outcome() {
        let paid = session("cs_1", "paid", "b");
        let unpaid = session("cs_2", "unpaid", "b");

        assert_eq!(webhook_outcome("checkout.session.completed", &paid), Some("paid"));
        // delayed payment methods complete before the money arrives
        assert_eq!(webhook_outcome("checkout.session.completed", &unpaid), None);
        assert_eq!(webhook_outcome("checkout.session.async_payment_succeeded", &unpaid), Some("paid"));
        assert_eq!(webhook_outcome("checkout.session.expired", &unpaid), Some("unpaid"));
        assert_eq!(webhook_outcome("invoice.paid", &paid), None);
    }

    #[test]
    fn test_checkout_params() {
        let booking = booking_with_property("396.00");
        let user = AuthUser {
            id: booking.booking.guest_id,
            email: Some("guest@stayhub.example".to_string()),
            role: "authenticated".to_string(),
        };

        let params = checkout_params(&booking, &user, None, "usd".to_string(), None, "https://stayhub.example").unwrap();
        let id = booking.booking.id;

        assert_eq!(params.product_name, "Booking: Sea View Loft");
        assert_eq!(params.description, "Booking reservation for Sea View Loft");
        assert_eq!(params.unit_amount, 39600);
        assert_eq!(params.customer_email.as_deref(), Some("guest@stayhub.example"));
        assert_eq!(
            params.success_url,
            format!("https://stayhub.example/payment-success?session_id={{CHECKOUT_SESSION_ID}}&booking_id={}", id)
        );
        assert_eq!(params.cancel_url, format!("https://stayhub.example/payment-canceled?booking_id={}", id));
        assert_eq!(params.user_id, user.id.to_string());

        let with_customer = checkout_params(&booking, &user, None, "usd".to_string(), Some("cus_1".to_string()), "https://stayhub.example").unwrap();
        assert!(with_customer.customer_email.is_none());
    }

    #[test]
    fn test_session_must_match_booking() {
        let booking_id = Uuid::new_v4();
        assert!(ensure_session_matches(&session("cs_1", "paid", &booking_id.to_string()), booking_id).is_ok());
        assert!(ensure_session_matches(&session("cs_1", "paid", "someone-else"), booking_id).is_err());
    }

    #[test]
    fn test_session_without_booking_metadata_is_accepted() {
        let mut untagged = session("cs_1", "paid", "");
        untagged.metadata.clear();
        assert!(ensure_session_matches(&untagged, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_payment_status_recorded_only_when_paid() {
        assert_eq!(recorded_payment_status(BookingStatus::Confirmed, "paid"), Some("paid"));
        assert_eq!(recorded_payment_status(BookingStatus::Cancelled, "unpaid"), None);
    }

    #[test]
    fn test_webhook_action() {
        let booking_id = Uuid::new_v4();

        // redelivered events never touch the booking again
        assert_eq!(webhook_action(false, Some(booking_id), Some("paid")), WebhookAction::Duplicate);
        assert_eq!(webhook_action(false, None, None), WebhookAction::Duplicate);

        assert_eq!(
            webhook_action(true, Some(booking_id), Some("unpaid")),
            WebhookAction::Settle(booking_id, "unpaid")
        );
        assert_eq!(webhook_action(true, None, Some("paid")), WebhookAction::NoBooking);
        assert_eq!(webhook_action(true, Some(booking_id), None), WebhookAction::NoChange);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let service = service();
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;
        let now = Utc::now().timestamp();

        assert!(matches!(
            service.handle_webhook(payload, None, now).await,
            Err(AppError::Unauthorized(_))
        ));
        let forged = sign_webhook_payload(payload, "whsec_wrong", now);
        assert!(matches!(
            service.handle_webhook(payload, Some(&forged), now).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_webhook_ignores_unrelated_events() {
        let service = service();
        let payload = br#"{"id":"evt_2","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let now = Utc::now().timestamp();
        let signature = sign_webhook_payload(payload, "whsec_test", now);

        assert!(service.handle_webhook(payload, Some(&signature), now).await.is_ok());
    }
}
