// /stayhub/services/booking-service/src/repository/booking.rs

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    models::*,
    utils::error::{AppError, AppResult},
};

/// Columns of a booking joined with its listing and the guest's display name
const BOOKING_WITH_PROPERTY_SELECT: &str = r#"
    SELECT
        b.id, b.property_id, b.guest_id, b.check_in_date, b.check_out_date,
        b.total_guests, b.total_cost, b.status, b.payment_session_id,
        b.payment_intent_id, b.payment_status, b.created_at, b.updated_at,
        p.title AS property_title,
        p.location AS property_location,
        p.images AS property_images,
        p.property_type::text AS property_type,
        p.host_id AS host_id,
        pr.full_name AS guest_name
    FROM bookings b
    LEFT JOIN properties p ON p.id = b.property_id
    LEFT JOIN profiles pr ON pr.user_id = b.guest_id
"#;

/// Whose bookings a list covers
#[derive(Debug, Clone, Copy)]
pub enum ListScope {
    Guest(Uuid),
    Host(Uuid),
    /// Every booking, for maintenance jobs
    All,
}

/// Validated list filters
#[derive(Debug, Clone, Default)]
pub struct BookingListFilter {
    pub status: Option<BookingStatus>,
    pub property_id: Option<Uuid>,
    pub tab: Option<String>,
    pub search: Option<String>,
}

/// Values needed to insert a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_guests: i32,
    pub total_cost: BigDecimal,
}

/// Repository for booking rows
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending booking
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &NewBooking,
    ) -> AppResult<Booking> {
        let created = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings
                (property_id, guest_id, check_in_date, check_out_date,
                 total_guests, total_cost, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING *
            "#,
        )
        .bind(booking.property_id)
        .bind(booking.guest_id)
        .bind(booking.check_in_date)
        .bind(booking.check_out_date)
        .bind(booking.total_guests)
        .bind(&booking.total_cost)
        .fetch_one(&mut **tx)
        .await?;

        Ok(created)
    }

    /// Booking with listing details
    pub async fn find_by_id(&self, booking_id: Uuid) -> AppResult<Option<BookingWithProperty>> {
        let sql = format!("{} WHERE b.id = $1", BOOKING_WITH_PROPERTY_SELECT);

        let booking = sqlx::query_as::<_, BookingWithProperty>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    /// Lock a booking row for a status change
    pub async fn find_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(booking)
    }

    /// Move a booking from `from` to `to`; None when the status moved underneath us
    pub async fn update_status_if(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>> {
        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(updated)
    }

    /// Whether [check_in, check_out) is free on the listing's calendar
    pub async fn check_availability<'e, E>(
        executor: E,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> AppResult<bool>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        // Closed window: touching neighbours are loaded too and judged by `stay_is_free`
        let entries = sqlx::query_as::<_, CalendarEntry>(
            r#"
            SELECT status::text AS kind, check_in_date AS starts_on, check_out_date AS ends_on
            FROM bookings
            WHERE property_id = $1 AND check_in_date <= $3 AND check_out_date >= $2
            UNION ALL
            SELECT 'blocked'::text, date, date + 1
            FROM property_availability
            WHERE property_id = $1 AND is_available = FALSE AND date >= $2 AND date <= $3
            "#,
        )
        .bind(property_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_all(executor)
        .await?;

        Ok(stay_is_free(&entries, check_in, check_out))
    }

    pub async fn check_availability_now(
        &self,
        property_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> AppResult<bool> {
        Self::check_availability(&self.pool, property_id, check_in, check_out).await
    }

    /// Paginated list for a guest or a host
    pub async fn list(
        &self,
        scope: ListScope,
        filter: &BookingListFilter,
        today: NaiveDate,
        page: u32,
        limit: u32,
    ) -> AppResult<(Vec<BookingWithProperty>, i64)> {
        let offset = (page.saturating_sub(1) as i64) * limit as i64;

        let mut count_builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            LEFT JOIN properties p ON p.id = b.property_id
            LEFT JOIN profiles pr ON pr.user_id = b.guest_id
            "#,
        );
        push_list_filters(&mut count_builder, scope, filter, today);

        let total: i64 = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query_builder = QueryBuilder::<Postgres>::new(BOOKING_WITH_PROPERTY_SELECT);
        push_list_filters(&mut query_builder, scope, filter, today);
        query_builder.push(" ORDER BY b.created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let bookings = query_builder
            .build_query_as::<BookingWithProperty>()
            .fetch_all(&self.pool)
            .await?;

        Ok((bookings, total))
    }

    /// Dashboard counters for a guest or a host
    pub async fn stats(&self, scope: ListScope, today: NaiveDate) -> AppResult<BookingStats> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE b.status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE b.status = 'confirmed') AS confirmed,
                COUNT(*) FILTER (WHERE b.status = 'confirmed' AND b.check_in_date > "#,
        );
        builder.push_bind(today);
        builder.push(
            r#") AS upcoming,
                COUNT(*) FILTER (WHERE b.status = 'confirmed' AND b.check_in_date <= "#,
        );
        builder.push_bind(today);
        builder.push(" AND b.check_out_date >= ");
        builder.push_bind(today);
        builder.push(
            r#") AS "current",
                COALESCE(SUM(b.total_cost) FILTER (WHERE b.status IN ('confirmed', 'completed')), 0) AS revenue
            FROM bookings b
            JOIN properties p ON p.id = b.property_id
            WHERE "#,
        );
        push_scope(&mut builder, scope);

        let stats = builder
            .build_query_as::<BookingStats>()
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }

    /// Cancel pending bookings created before the cutoff; returns affected ids
    pub async fn cancel_stale_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        older_than_hours: i64,
    ) -> AppResult<Vec<Uuid>> {
        let hours = i32::try_from(older_than_hours)
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid TTL of {} hours", older_than_hours)))?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(hours => $1::int)
            RETURNING id
            "#,
        )
        .bind(hours)
        .fetch_all(&mut **tx)
        .await?;

        Ok(ids)
    }
}

/// A stretch of a listing's calendar: a booking, or a blocked day as a one-night range
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CalendarEntry {
    pub kind: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl CalendarEntry {
    const BLOCKING: [&'static str; 3] = ["pending", "confirmed", "blocked"];

    /// Ranges are half-open, so a check-out day is free for the next check-in
    pub fn blocks(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        Self::BLOCKING.contains(&self.kind.as_str())
            && self.starts_on < check_out
            && self.ends_on > check_in
    }
}

pub fn stay_is_free(entries: &[CalendarEntry], check_in: NaiveDate, check_out: NaiveDate) -> bool {
    !entries.iter().any(|entry| entry.blocks(check_in, check_out))
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: ListScope) {
    match scope {
        ListScope::Guest(guest_id) => {
            builder.push("b.guest_id = ");
            builder.push_bind(guest_id);
        }
        ListScope::Host(host_id) => {
            builder.push("p.host_id = ");
            builder.push_bind(host_id);
        }
        ListScope::All => {
            builder.push("TRUE");
        }
    }
}

/// Append WHERE conditions shared by the count and page queries
fn push_list_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    scope: ListScope,
    filter: &BookingListFilter,
    today: NaiveDate,
) {
    builder.push(" WHERE ");
    push_scope(builder, scope);

    if let Some(status) = filter.status {
        builder.push(" AND b.status = ");
        builder.push_bind(status.as_str());
    }

    if let Some(property_id) = filter.property_id {
        builder.push(" AND b.property_id = ");
        builder.push_bind(property_id);
    }

    match filter.tab.as_deref() {
        Some("pending") => {
            builder.push(" AND b.status = 'pending'");
        }
        Some("confirmed") => {
            builder.push(" AND b.status = 'confirmed'");
        }
        Some("upcoming") => {
            builder.push(" AND b.status = 'confirmed' AND b.check_in_date > ");
            builder.push_bind(today);
        }
        Some("current") => {
            builder.push(" AND b.status = 'confirmed' AND b.check_in_date <= ");
            builder.push_bind(today);
            builder.push(" AND b.check_out_date >= ");
            builder.push_bind(today);
        }
        _ => {}
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        match scope {
            ListScope::Guest(_) => {
                builder.push(" AND p.title ILIKE ");
                builder.push_bind(pattern);
            }
            ListScope::Host(_) | ListScope::All => {
                builder.push(" AND (p.title ILIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" OR pr.full_name ILIKE ");
                builder.push_bind(pattern);
                builder.push(")");
            }
        }
    }
}

/// Escape LIKE metacharacters so user input matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars().take(100) {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
    }

    fn stay(kind: &str, from: NaiveDate, to: NaiveDate) -> CalendarEntry {
        CalendarEntry { kind: kind.to_string(), starts_on: from, ends_on: to }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
    }

    #[test]
    fn test_back_to_back_stays_are_allowed() {
        let calendar = vec![stay("confirmed", day(1), day(4)), stay("pending", day(8), day(10))];

        assert!(stay_is_free(&calendar, day(4), day(8)));
        assert!(!stay_is_free(&calendar, day(3), day(5)));
        assert!(!stay_is_free(&calendar, day(7), day(9)));
        // a stay wrapping an existing booking
        assert!(!stay_is_free(&calendar, day(5), day(12)));
    }

    #[test]
    fn test_released_bookings_do_not_block() {
        let calendar = vec![stay("cancelled", day(1), day(5)), stay("completed", day(5), day(9))];
        assert!(stay_is_free(&calendar, day(2), day(8)));
    }

    #[test]
    fn test_blocked_days_inside_the_stay() {
        let calendar = vec![stay("blocked", day(10), day(11))];

        assert!(!stay_is_free(&calendar, day(9), day(11)));
        assert!(!stay_is_free(&calendar, day(10), day(11)));
        // blocked on the check-out day only: that night is not slept
        assert!(stay_is_free(&calendar, day(7), day(10)));
        assert!(stay_is_free(&calendar, day(11), day(13)));
    }

    #[test]
    fn test_empty_calendar_is_free() {
        assert!(stay_is_free(&[], day(1), day(2)));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("villa"), "villa");
    }

    #[test]
    fn test_guest_scope_filters() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM bookings b");
        let filter = BookingListFilter {
            status: Some(BookingStatus::Pending),
            search: Some("beach".to_string()),
            ..Default::default()
        };
        push_list_filters(&mut builder, ListScope::Guest(Uuid::nil()), &filter, today());

        let sql = builder.sql();
        assert!(sql.contains("WHERE b.guest_id = $1"));
        assert!(sql.contains("AND b.status = $2"));
        assert!(sql.contains("AND p.title ILIKE $3"));
        assert!(!sql.contains("full_name"));
    }

    #[test]
    fn test_host_scope_searches_guest_name() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM bookings b");
        let filter = BookingListFilter {
            tab: Some("current".to_string()),
            search: Some("ana".to_string()),
            ..Default::default()
        };
        push_list_filters(&mut builder, ListScope::Host(Uuid::nil()), &filter, today());

        let sql = builder.sql();
        assert!(sql.contains("WHERE p.host_id = $1"));
        assert!(sql.contains("b.check_in_date <= $2 AND b.check_out_date >= $3"));
        assert!(sql.contains("pr.full_name ILIKE $5"));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM bookings b");
        let filter = BookingListFilter {
            search: Some("   ".to_string()),
            tab: Some("all".to_string()),
            ..Default::default()
        };
        push_list_filters(&mut builder, ListScope::Guest(Uuid::nil()), &filter, today());
        assert!(!builder.sql().contains("ILIKE"));
    }
}
