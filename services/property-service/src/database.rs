// /stayhub/services/property-service/src/database.rs

use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

// ===== ERROR HANDLING =====
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error")]
    Connection(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    Validation(String),
}

const PROPERTY_COLUMNS: &str = "id, host_id, title, description, property_type::text AS property_type, \
     location, address, latitude, longitude, price_per_night, max_guests, bedrooms, bathrooms, \
     amenities, images, is_active, created_at, updated_at";

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

// ===== HELPERS =====

/// Escape LIKE wildcards so user input only ever matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

async fn write_audit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    action: &str,
    resource_type: &str,
    resource_id: Uuid,
    details: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(details)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ===== SEARCH FILTER =====

/// Normalized search parameters; everything here is safe to bind
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySearch {
    pub text: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub guests: Option<i32>,
    pub amenities: Vec<String>,
    pub page: u32,
    pub limit: u32,
    pub sort_column: &'static str,
    pub sort_direction: &'static str,
}

impl PropertySearch {
    pub fn from_params(params: &PropertyQueryParams) -> Result<Self, DatabaseError> {
        let page = params.page.unwrap_or(1).max(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let property_type = match params.property_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Some(raw.parse::<PropertyType>().map_err(DatabaseError::Validation)?)
            }
            _ => None,
        };

        if let (Some(min), Some(max)) = (&params.min_price, &params.max_price) {
            if min > max {
                return Err(DatabaseError::Validation(
                    "min_price cannot exceed max_price".to_string(),
                ));
            }
        }

        let amenities = params
            .amenities
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let sort_column = match params.sort_by.as_deref() {
            Some("price") => "price_per_night",
            Some("title") => "title",
            _ => "created_at",
        };

        let sort_direction = match params.sort_order.as_deref().map(str::to_lowercase).as_deref() {
            Some("asc") => "ASC",
            _ => "DESC",
        };

        Ok(Self {
            text: non_blank(params.q.as_deref()),
            location: non_blank(params.location.as_deref()),
            property_type,
            min_price: params.min_price.clone(),
            max_price: params.max_price.clone(),
            guests: params.guests.filter(|g| *g > 0),
            amenities,
            page,
            limit,
            sort_column,
            sort_direction,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// Append the WHERE conditions shared by the count and page queries
    pub fn push_filters(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE is_active = TRUE");

        if let Some(text) = &self.text {
            let pattern = format!("%{}%", escape_like(text));
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR COALESCE(description, '') ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR location ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if let Some(location) = &self.location {
            builder.push(" AND location ILIKE ");
            builder.push_bind(format!("%{}%", escape_like(location)));
        }

        if let Some(property_type) = self.property_type {
            builder.push(" AND property_type = ");
            builder.push_bind(property_type.as_str());
            builder.push("::property_type");
        }

        if let Some(min_price) = &self.min_price {
            builder.push(" AND price_per_night >= ");
            builder.push_bind(min_price.clone());
        }

        if let Some(max_price) = &self.max_price {
            builder.push(" AND price_per_night <= ");
            builder.push_bind(max_price.clone());
        }

        if let Some(guests) = self.guests {
            builder.push(" AND max_guests >= ");
            builder.push_bind(guests);
        }

        if !self.amenities.is_empty() {
            builder.push(" AND amenities @> ");
            builder.push_bind(self.amenities.clone());
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// What `delete` actually did to the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deactivated,
    Deleted,
}

// ===== PROPERTIES =====
pub struct PropertyRepository;

impl PropertyRepository {
    pub async fn search(
        pool: &PgPool,
        search: &PropertySearch,
    ) -> Result<(Vec<Property>, PaginationMeta), DatabaseError> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties");
        search.push_filters(&mut count_builder);

        let total_items = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await?;

        let mut query_builder = QueryBuilder::<Postgres>::new("SELECT ");
        query_builder.push(PROPERTY_COLUMNS);
        query_builder.push(" FROM properties");
        search.push_filters(&mut query_builder);

        // Stable tiebreak so pages never overlap
        query_builder.push(" ORDER BY ");
        query_builder.push(search.sort_column);
        query_builder.push(" ");
        query_builder.push(search.sort_direction);
        query_builder.push(" NULLS LAST, id ASC LIMIT ");
        query_builder.push_bind(search.limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(search.offset());

        let properties = query_builder
            .build_query_as::<Property>()
            .fetch_all(pool)
            .await?;

        let pagination = PaginationMeta::new(search.page, search.limit, total_items);
        Ok((properties, pagination))
    }

    /// Active listing, or any listing when `viewer` is its host
    pub async fn get_visible(
        pool: &PgPool,
        property_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Property, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM properties WHERE id = $1 AND (is_active = TRUE OR host_id = $2)",
            PROPERTY_COLUMNS
        );

        sqlx::query_as::<_, Property>(&sql)
            .bind(property_id)
            .bind(viewer)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Property not found".to_string()))
    }

    pub async fn list_by_host(pool: &PgPool, host_id: Uuid) -> Result<Vec<Property>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM properties WHERE host_id = $1 ORDER BY created_at DESC",
            PROPERTY_COLUMNS
        );

        Ok(sqlx::query_as::<_, Property>(&sql)
            .bind(host_id)
            .fetch_all(pool)
            .await?)
    }

    pub async fn create(
        pool: &PgPool,
        host_id: Uuid,
        property_type: PropertyType,
        request: &CreatePropertyRequest,
    ) -> Result<Property, DatabaseError> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            "INSERT INTO properties (host_id, title, description, property_type, location, address, \
             latitude, longitude, price_per_night, max_guests, bedrooms, bathrooms, amenities, images) \
             VALUES ($1, $2, $3, $4::property_type, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            PROPERTY_COLUMNS
        );

        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(host_id)
            .bind(request.title.trim())
            .bind(request.description.as_deref().map(str::trim))
            .bind(property_type.as_str())
            .bind(request.location.trim())
            .bind(request.address.as_deref().map(str::trim))
            .bind(request.latitude)
            .bind(request.longitude)
            .bind(&request.price_per_night)
            .bind(request.max_guests)
            .bind(request.bedrooms)
            .bind(request.bathrooms)
            .bind(request.amenities.clone().unwrap_or_default())
            .bind(request.images.clone().unwrap_or_default())
            .fetch_one(&mut *tx)
            .await?;

        write_audit(
            &mut tx,
            host_id,
            "PROPERTY_CREATED",
            "property",
            property.id,
            serde_json::json!({ "title": property.title }),
        )
        .await?;

        tx.commit().await?;
        Ok(property)
    }

    /// Lock the row and make sure the caller hosts it
    async fn lock_owned(
        tx: &mut Transaction<'_, Postgres>,
        property_id: Uuid,
        host_id: Uuid,
    ) -> Result<(), DatabaseError> {
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT host_id FROM properties WHERE id = $1 FOR UPDATE")
                .bind(property_id)
                .fetch_optional(&mut **tx)
                .await?;

        match owner {
            None => Err(DatabaseError::NotFound("Property not found".to_string())),
            Some(owner) if owner != host_id => Err(DatabaseError::Forbidden(
                "Only the host can modify this property".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    pub async fn update(
        pool: &PgPool,
        property_id: Uuid,
        host_id: Uuid,
        property_type: Option<PropertyType>,
        request: &UpdatePropertyRequest,
    ) -> Result<Property, DatabaseError> {
        let mut tx = pool.begin().await?;
        Self::lock_owned(&mut tx, property_id, host_id).await?;

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE properties SET ");
        let mut separated = builder.separated(", ");
        let mut changed: Vec<&str> = Vec::new();

        if let Some(title) = &request.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title.trim().to_string());
            changed.push("title");
        }
        if let Some(description) = &request.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description.trim().to_string());
            changed.push("description");
        }
        if let Some(property_type) = property_type {
            separated.push("property_type = ");
            separated.push_bind_unseparated(property_type.as_str());
            separated.push_unseparated("::property_type");
            changed.push("property_type");
        }
        if let Some(location) = &request.location {
            separated.push("location = ");
            separated.push_bind_unseparated(location.trim().to_string());
            changed.push("location");
        }
        if let Some(address) = &request.address {
            separated.push("address = ");
            separated.push_bind_unseparated(address.trim().to_string());
            changed.push("address");
        }
        if let Some(latitude) = request.latitude {
            separated.push("latitude = ");
            separated.push_bind_unseparated(latitude);
            changed.push("latitude");
        }
        if let Some(longitude) = request.longitude {
            separated.push("longitude = ");
            separated.push_bind_unseparated(longitude);
            changed.push("longitude");
        }
        if let Some(price) = &request.price_per_night {
            separated.push("price_per_night = ");
            separated.push_bind_unseparated(price.clone());
            changed.push("price_per_night");
        }
        if let Some(max_guests) = request.max_guests {
            separated.push("max_guests = ");
            separated.push_bind_unseparated(max_guests);
            changed.push("max_guests");
        }
        if let Some(bedrooms) = request.bedrooms {
            separated.push("bedrooms = ");
            separated.push_bind_unseparated(bedrooms);
            changed.push("bedrooms");
        }
        if let Some(bathrooms) = request.bathrooms {
            separated.push("bathrooms = ");
            separated.push_bind_unseparated(bathrooms);
            changed.push("bathrooms");
        }
        if let Some(amenities) = &request.amenities {
            separated.push("amenities = ");
            separated.push_bind_unseparated(amenities.clone());
            changed.push("amenities");
        }
        if let Some(images) = &request.images {
            separated.push("images = ");
            separated.push_bind_unseparated(images.clone());
            changed.push("images");
        }
        if let Some(is_active) = request.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
            changed.push("is_active");
        }

        separated.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(property_id);
        builder.push(" RETURNING ");
        builder.push(PROPERTY_COLUMNS);

        let property = builder
            .build_query_as::<Property>()
            .fetch_one(&mut *tx)
            .await?;

        write_audit(
            &mut tx,
            host_id,
            "PROPERTY_UPDATED",
            "property",
            property_id,
            serde_json::json!({ "fields": changed }),
        )
        .await?;

        tx.commit().await?;
        Ok(property)
    }

    /// Deactivate when bookings reference the listing, remove it otherwise
    pub async fn delete(
        pool: &PgPool,
        property_id: Uuid,
        host_id: Uuid,
    ) -> Result<DeleteOutcome, DatabaseError> {
        let mut tx = pool.begin().await?;
        Self::lock_owned(&mut tx, property_id, host_id).await?;

        let has_bookings: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE property_id = $1)")
                .bind(property_id)
                .fetch_one(&mut *tx)
                .await?;

        let outcome = if has_bookings {
            sqlx::query("UPDATE properties SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(property_id)
                .execute(&mut *tx)
                .await?;
            DeleteOutcome::Deactivated
        } else {
            sqlx::query("DELETE FROM properties WHERE id = $1")
                .bind(property_id)
                .execute(&mut *tx)
                .await?;
            DeleteOutcome::Deleted
        };

        write_audit(
            &mut tx,
            host_id,
            "PROPERTY_DELETED",
            "property",
            property_id,
            serde_json::json!({ "soft": outcome == DeleteOutcome::Deactivated }),
        )
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }
}

// ===== CATEGORIES =====
pub struct CategoryRepository;

impl CategoryRepository {
    pub async fn list(pool: &PgPool) -> Result<Vec<PropertyCategory>, DatabaseError> {
        Ok(sqlx::query_as::<_, PropertyCategory>(
            "SELECT id, name, description, icon, color, created_at \
             FROM property_categories ORDER BY name ASC",
        )
        .fetch_all(pool)
        .await?)
    }
}

// ===== REVIEWS =====
pub struct ReviewRepository;

impl ReviewRepository {
    pub async fn list_for_property(
        pool: &PgPool,
        property_id: Uuid,
    ) -> Result<(Vec<ReviewWithGuest>, ReviewStats), DatabaseError> {
        let reviews = sqlx::query_as::<_, ReviewWithGuest>(
            r#"
            SELECT
                r.id, r.booking_id, r.property_id, r.reviewer_id, r.rating, r.comment,
                r.host_reply, r.host_reply_at, r.created_at, r.updated_at,
                p.full_name AS reviewer_name,
                p.avatar_url AS reviewer_avatar
            FROM reviews r
            LEFT JOIN profiles p ON p.user_id = r.reviewer_id
            WHERE r.property_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(property_id)
        .fetch_all(pool)
        .await?;

        let stats = Self::calculate_stats(pool, property_id).await?;
        Ok((reviews, stats))
    }

    async fn calculate_stats(pool: &PgPool, property_id: Uuid) -> Result<ReviewStats, DatabaseError> {
        Ok(sqlx::query_as::<_, ReviewStats>(
            r#"
            SELECT
                COUNT(*) AS total_reviews,
                COALESCE(AVG(rating)::double precision, 0.0) AS average_rating,
                COUNT(*) FILTER (WHERE rating = 5) AS five_star,
                COUNT(*) FILTER (WHERE rating = 4) AS four_star,
                COUNT(*) FILTER (WHERE rating = 3) AS three_star,
                COUNT(*) FILTER (WHERE rating = 2) AS two_star,
                COUNT(*) FILTER (WHERE rating = 1) AS one_star
            FROM reviews
            WHERE property_id = $1
            "#,
        )
        .bind(property_id)
        .fetch_one(pool)
        .await?)
    }

    /// Guest review of a completed stay, one per booking
    pub async fn create(
        pool: &PgPool,
        booking_id: Uuid,
        reviewer_id: Uuid,
        request: &CreateReviewRequest,
    ) -> Result<Review, DatabaseError> {
        let mut tx = pool.begin().await?;

        let booking = sqlx::query_as::<_, ReviewableBooking>(
            "SELECT id, property_id, guest_id, status FROM bookings WHERE id = $1 FOR SHARE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Booking not found".to_string()))?;

        check_reviewable(&booking, reviewer_id)?;

        let inserted = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (booking_id, property_id, reviewer_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, booking_id, property_id, reviewer_id, rating, comment, \
                       host_reply, host_reply_at, created_at, updated_at",
        )
        .bind(booking.id)
        .bind(booking.property_id)
        .bind(reviewer_id)
        .bind(request.rating)
        .bind(request.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .fetch_one(&mut *tx)
        .await;

        let review = match inserted {
            Ok(review) => review,
            Err(e) if is_unique_violation(&e) => {
                return Err(DatabaseError::Duplicate(
                    "This booking has already been reviewed".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        write_audit(
            &mut tx,
            reviewer_id,
            "REVIEW_CREATED",
            "review",
            review.id,
            serde_json::json!({ "booking_id": booking_id, "rating": review.rating }),
        )
        .await?;

        tx.commit().await?;
        Ok(review)
    }

    /// Host reply; replaces any earlier reply
    pub async fn reply(
        pool: &PgPool,
        review_id: Uuid,
        host_id: Uuid,
        reply: &str,
    ) -> Result<Review, DatabaseError> {
        let mut tx = pool.begin().await?;

        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT p.host_id FROM reviews r JOIN properties p ON p.id = r.property_id \
             WHERE r.id = $1 FOR UPDATE OF r",
        )
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?;

        match owner {
            None => return Err(DatabaseError::NotFound("Review not found".to_string())),
            Some(owner) if owner != host_id => {
                return Err(DatabaseError::Forbidden(
                    "Only the property's host can reply to this review".to_string(),
                ))
            }
            Some(_) => {}
        }

        let review = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET host_reply = $2, host_reply_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id, booking_id, property_id, reviewer_id, rating, comment, \
                       host_reply, host_reply_at, created_at, updated_at",
        )
        .bind(review_id)
        .bind(reply.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(review)
    }
}

/// Reviews are limited to the guest of a completed booking
pub fn check_reviewable(booking: &ReviewableBooking, reviewer_id: Uuid) -> Result<(), DatabaseError> {
    if booking.guest_id != reviewer_id {
        return Err(DatabaseError::Forbidden(
            "Only the guest of this booking can review it".to_string(),
        ));
    }
    if booking.status != "completed" {
        return Err(DatabaseError::Validation(
            "Only completed stays can be reviewed".to_string(),
        ));
    }
    Ok(())
}

// ===== PROFILES =====
pub struct ProfileRepository;

const PROFILE_COLUMNS: &str = "id, user_id, full_name, phone, avatar_url, date_of_birth, \
     preferred_language, created_at, updated_at";

impl ProfileRepository {
    pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        Ok(sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await?)
    }

    /// Insert or update; omitted fields keep their stored value
    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        request: &UpsertProfileRequest,
    ) -> Result<Profile, DatabaseError> {
        let sql = format!(
            "INSERT INTO profiles (user_id, full_name, phone, avatar_url, date_of_birth, preferred_language) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 full_name = COALESCE(EXCLUDED.full_name, profiles.full_name), \
                 phone = COALESCE(EXCLUDED.phone, profiles.phone), \
                 avatar_url = COALESCE(EXCLUDED.avatar_url, profiles.avatar_url), \
                 date_of_birth = COALESCE(EXCLUDED.date_of_birth, profiles.date_of_birth), \
                 preferred_language = COALESCE(EXCLUDED.preferred_language, profiles.preferred_language), \
                 updated_at = NOW() \
             RETURNING {}",
            PROFILE_COLUMNS
        );

        Ok(sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .bind(request.full_name.as_deref().map(str::trim))
            .bind(request.phone.as_deref().map(str::trim))
            .bind(request.avatar_url.as_deref())
            .bind(request.date_of_birth)
            .bind(request.preferred_language.as_deref())
            .fetch_one(pool)
            .await?)
    }

    /// Liveness probe used by the health endpoint
    pub async fn ping(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PropertyQueryParams {
        PropertyQueryParams::default()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like(" 100%_off\\ "), "100\\%\\_off\\\\");
        assert_eq!(escape_like("Bali"), "Bali");
    }

    #[test]
    fn test_search_defaults() {
        let search = PropertySearch::from_params(&params()).unwrap();
        assert_eq!(search.page, 1);
        assert_eq!(search.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(search.sort_column, "created_at");
        assert_eq!(search.sort_direction, "DESC");
        assert_eq!(search.offset(), 0);
        assert!(search.amenities.is_empty());
    }

    #[test]
    fn test_search_normalizes_input() {
        let search = PropertySearch::from_params(&PropertyQueryParams {
            q: Some("   ".to_string()),
            property_type: Some("Villa".to_string()),
            amenities: Some("wifi, pool,,".to_string()),
            page: Some(3),
            limit: Some(500),
            sort_by: Some("price".to_string()),
            sort_order: Some("ASC".to_string()),
            ..params()
        })
        .unwrap();

        assert_eq!(search.text, None);
        assert_eq!(search.property_type, Some(PropertyType::Villa));
        assert_eq!(search.amenities, vec!["wifi".to_string(), "pool".to_string()]);
        assert_eq!(search.limit, MAX_PAGE_SIZE);
        assert_eq!(search.offset(), 200);
        assert_eq!(search.sort_column, "price_per_night");
        assert_eq!(search.sort_direction, "ASC");
    }

    #[test]
    fn test_search_rejects_bad_filters() {
        let bad_type = PropertyQueryParams {
            property_type: Some("castle".to_string()),
            ..params()
        };
        assert!(matches!(
            PropertySearch::from_params(&bad_type),
            Err(DatabaseError::Validation(_))
        ));

        let inverted = PropertyQueryParams {
            min_price: Some(BigDecimal::from(200)),
            max_price: Some(BigDecimal::from(100)),
            ..params()
        };
        assert!(PropertySearch::from_params(&inverted).is_err());
    }

    #[test]
    fn test_push_filters_sql() {
        let search = PropertySearch::from_params(&PropertyQueryParams {
            q: Some("beach".to_string()),
            property_type: Some("hotel".to_string()),
            guests: Some(4),
            amenities: Some("wifi".to_string()),
            ..params()
        })
        .unwrap();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties");
        search.push_filters(&mut builder);
        let sql = builder.sql();

        assert!(sql.contains("WHERE is_active = TRUE"));
        assert!(sql.contains("title ILIKE $1"));
        assert!(sql.contains("location ILIKE $3"));
        assert!(sql.contains("property_type = $4::property_type"));
        assert!(sql.contains("max_guests >= $5"));
        assert!(sql.contains("amenities @> $6"));
        assert!(!sql.contains("price_per_night"));
    }

    #[test]
    fn test_check_reviewable() {
        let guest = Uuid::new_v4();
        let mut booking = ReviewableBooking {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: guest,
            status: "completed".to_string(),
        };

        assert!(check_reviewable(&booking, guest).is_ok());
        assert!(matches!(
            check_reviewable(&booking, Uuid::new_v4()),
            Err(DatabaseError::Forbidden(_))
        ));

        booking.status = "confirmed".to_string();
        assert!(matches!(
            check_reviewable(&booking, guest),
            Err(DatabaseError::Validation(_))
        ));
    }
}
