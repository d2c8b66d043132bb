// /stayhub/services/booking-service/src/repository/payment.rs

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    models::{Booking, BookingStatus},
    utils::error::AppResult,
};

/// Repository for payment columns on bookings and processed webhook events
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remember which checkout session belongs to a booking
    pub async fn set_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        session_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET payment_session_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(session_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Write the verification outcome; status only changes when it still equals `expected`
    pub async fn apply_outcome(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        expected: BookingStatus,
        new_status: BookingStatus,
        payment_intent_id: Option<&str>,
        payment_status: Option<&str>,
    ) -> AppResult<Option<Booking>> {
        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $3,
                payment_intent_id = COALESCE($4, payment_intent_id),
                payment_status = COALESCE($5, payment_status),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(expected.as_str())
        .bind(new_status.as_str())
        .bind(payment_intent_id)
        .bind(payment_status)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(updated)
    }

    /// Find the booking a checkout session was opened for
    pub async fn find_by_session(&self, session_id: &str) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE payment_session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Record a webhook event id; false when it was already processed
    pub async fn record_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: &str,
        event_type: &str,
        booking_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (event_id, event_type, booking_id, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(booking_id)
        .bind(payload)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
