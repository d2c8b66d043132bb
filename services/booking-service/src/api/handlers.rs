// /stayhub/services/booking-service/src/api/handlers.rs

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::*,
    repository::booking::ListScope,
    utils::{
        error::{AppError, AppResult},
        health::{comprehensive_health_check, HealthCheckResult, HealthStatus},
    },
    AppState,
};

// ========================= AVAILABILITY & QUOTES =========================

/// GET /api/properties/{id}/availability
pub async fn check_availability(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Query(stay): Query<StayQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = state
        .booking_service
        .availability(property_id, stay.check_in, stay.check_out)
        .await?;

    Ok(Json(AvailabilityResponse {
        success: true,
        property_id,
        check_in: stay.check_in,
        check_out: stay.check_out,
        available,
    }))
}

/// GET /api/properties/{id}/quote
pub async fn get_quote(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Query(stay): Query<StayQuery>,
) -> AppResult<Json<QuoteResponse>> {
    let (quote, available) = state
        .booking_service
        .quote(property_id, &stay, Utc::now().date_naive())
        .await?;

    Ok(Json(QuoteResponse {
        success: true,
        property_id,
        available,
        quote,
    }))
}

// ========================= BOOKING HANDLERS =========================

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    payload.validate()?;

    let booking = state
        .booking_service
        .create_booking(&user, &payload, Utc::now().date_naive())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            message: "Booking created".to_string(),
            data: Some(booking),
        }),
    ))
}

/// GET /api/bookings
pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<BookingQueryParams>,
) -> AppResult<Json<BookingsListResponse>> {
    let (bookings, pagination) = state
        .booking_service
        .list(ListScope::Guest(user.id), &params, Utc::now().date_naive())
        .await?;

    Ok(Json(BookingsListResponse {
        success: true,
        message: format!("{} bookings found", pagination.total_items),
        data: bookings,
        pagination: Some(pagination),
    }))
}

/// GET /api/host/bookings
pub async fn list_host_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<BookingQueryParams>,
) -> AppResult<Json<BookingsListResponse>> {
    let (bookings, pagination) = state
        .booking_service
        .list(ListScope::Host(user.id), &params, Utc::now().date_naive())
        .await?;

    Ok(Json(BookingsListResponse {
        success: true,
        message: format!("{} bookings found", pagination.total_items),
        data: bookings,
        pagination: Some(pagination),
    }))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.booking_service.get_booking(&user, booking_id).await?;

    Ok(Json(BookingResponse {
        success: true,
        message: "Booking found".to_string(),
        data: Some(booking),
    }))
}

/// PUT /api/bookings/{id}/status
pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> AppResult<Json<BookingResponse>> {
    payload.validate()?;

    let booking = state
        .booking_service
        .update_status(&user, booking_id, &payload.status, Utc::now().date_naive())
        .await?;

    Ok(Json(BookingResponse {
        success: true,
        message: format!("Booking is now {}", booking.booking.status),
        data: Some(booking),
    }))
}

/// GET /api/bookings/stats
pub async fn guest_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let stats = state
        .booking_service
        .stats(ListScope::Guest(user.id), Utc::now().date_naive())
        .await?;

    Ok(Json(serde_json::json!({ "success": true, "data": stats })))
}

/// GET /api/host/bookings/stats
pub async fn host_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let stats = state
        .booking_service
        .stats(ListScope::Host(user.id), Utc::now().date_naive())
        .await?;

    Ok(Json(serde_json::json!({ "success": true, "data": stats })))
}

// ========================= PAYMENT HANDLERS =========================

/// POST /api/payments/checkout
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    payload.validate()?;

    let origin = headers.get(header::ORIGIN).and_then(|h| h.to_str().ok());

    let checkout = state
        .payment_service
        .create_checkout(&user, &payload, origin)
        .await?;

    Ok(Json(checkout))
}

/// POST /api/payments/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    payload.validate()?;

    let result = state.payment_service.verify_payment(&user, &payload).await?;

    tracing::info!(
        "Payment verified for booking {}: payment={}, booking={}",
        payload.booking_id, result.payment_status, result.booking_status
    );

    Ok(Json(result))
}

/// POST /api/webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let signature = headers.get("stripe-signature").and_then(|h| h.to_str().ok());

    state
        .payment_service
        .handle_webhook(&body, signature, Utc::now().timestamp())
        .await?;

    Ok(Json(serde_json::json!({ "received": true })))
}

// ========================= HEALTH =========================

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthCheckResult>) {
    let result = comprehensive_health_check(&state.repository, &state.scheduler_metrics).await;

    let status = match result.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status, Json(result))
}

/// Handler for unmatched routes
pub async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}
