// /stayhub/services/booking-service/src/repository/property.rs

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{models::PropertySummary, utils::error::AppResult};

const PROPERTY_SUMMARY_SELECT: &str = r#"
    SELECT id, host_id, title, price_per_night, max_guests, is_active
    FROM properties
    WHERE id = $1
"#;

/// Read-only view of listings owned by the property service
pub struct PropertyRepository {
    pool: PgPool,
}

impl PropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_summary(&self, property_id: Uuid) -> AppResult<Option<PropertySummary>> {
        let property = sqlx::query_as::<_, PropertySummary>(PROPERTY_SUMMARY_SELECT)
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(property)
    }

    /// Row-lock the listing so concurrent bookings on it serialize
    pub async fn lock_for_booking(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        property_id: Uuid,
    ) -> AppResult<Option<PropertySummary>> {
        let sql = format!("{} FOR UPDATE", PROPERTY_SUMMARY_SELECT);

        let property = sqlx::query_as::<_, PropertySummary>(&sql)
            .bind(property_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(property)
    }
}
