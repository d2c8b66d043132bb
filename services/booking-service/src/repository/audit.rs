// /stayhub/services/booking-service/src/repository/audit.rs

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{models::BookingStatus, utils::error::AppResult};

/// Repository for audit logging
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Option<Uuid>,
        action: &str,
        booking_id: Uuid,
        details: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details)
            VALUES ($1, $2, 'booking', $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(booking_id)
        .bind(details)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Log booking created
    pub async fn log_booking_created(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        guest_id: Uuid,
        booking_id: Uuid,
        total_cost: &bigdecimal::BigDecimal,
    ) -> AppResult<()> {
        self.record(
            tx,
            Some(guest_id),
            "BOOKING_CREATED",
            booking_id,
            serde_json::json!({ "total_cost": total_cost.to_string() }),
        )
        .await
    }

    /// Log a lifecycle transition; `actor` is None for system-driven changes
    pub async fn log_status_changed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        actor: Option<Uuid>,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        source: &str,
    ) -> AppResult<()> {
        self.record(
            tx,
            actor,
            "BOOKING_STATUS_CHANGED",
            booking_id,
            serde_json::json!({ "from": from, "to": to, "source": source }),
        )
        .await
    }

    /// Log checkout session opened for a booking
    pub async fn log_checkout_created(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        guest_id: Uuid,
        booking_id: Uuid,
        session_id: &str,
    ) -> AppResult<()> {
        self.record(
            tx,
            Some(guest_id),
            "CHECKOUT_CREATED",
            booking_id,
            serde_json::json!({ "session_id": session_id }),
        )
        .await
    }

    /// Drop audit rows older than `days`
    pub async fn prune_older_than(&self, days: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM audit_logs WHERE created_at < NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
