// /stayhub/services/property-service/src/handlers.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::database::{
    CategoryRepository, DeleteOutcome, ProfileRepository, PropertyRepository, PropertySearch,
    ReviewRepository,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::AppState;

const PROPERTY_CACHE_TTL_SECS: u64 = 300;

fn property_cache_key(property_id: Uuid) -> String {
    format!("property:{}", property_id)
}

async fn invalidate_property(state: &AppState, property_id: Uuid) {
    if let Err(e) = state.cache.delete(&property_cache_key(property_id)).await {
        tracing::warn!("Failed to invalidate cache for property {}: {}", property_id, e);
    }
}

// ===== PROPERTIES =====

/// GET /api/properties
pub async fn search_properties(
    State(state): State<AppState>,
    Query(params): Query<PropertyQueryParams>,
) -> AppResult<Json<PaginatedPropertiesResponse>> {
    let search = PropertySearch::from_params(&params)?;
    let (properties, pagination) = PropertyRepository::search(&state.db, &search).await?;

    Ok(Json(PaginatedPropertiesResponse::success(properties, pagination)))
}

/// GET /api/properties/{id}
pub async fn get_property(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    viewer: Option<Extension<AuthUser>>,
) -> AppResult<Json<ApiResponse<Property>>> {
    let key = property_cache_key(property_id);

    match state.cache.get::<Property>(&key).await {
        Ok(Some(property)) => {
            return Ok(Json(ApiResponse::success("Property retrieved", property)));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
    }

    let viewer_id = viewer.map(|Extension(user)| user.id);
    let property = PropertyRepository::get_visible(&state.db, property_id, viewer_id).await?;

    // Hidden listings are only ever served to their host, never from cache
    if property.is_active {
        if let Err(e) = state.cache.set(&key, &property, PROPERTY_CACHE_TTL_SECS).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    Ok(Json(ApiResponse::success("Property retrieved", property)))
}

/// POST /api/properties
pub async fn create_property(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePropertyRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Property>>)> {
    payload.validate()?;
    let property_type = payload
        .validate_business_rules()
        .map_err(AppError::ValidationError)?;

    let property = PropertyRepository::create(&state.db, user.id, property_type, &payload).await?;
    tracing::info!("Host {} created property {}", user.id, property.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Property created", property)),
    ))
}

/// PUT /api/properties/{id}
pub async fn update_property(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyRequest>,
) -> AppResult<Json<ApiResponse<Property>>> {
    payload.validate()?;
    let property_type = payload
        .validate_business_rules()
        .map_err(AppError::ValidationError)?;

    let property =
        PropertyRepository::update(&state.db, property_id, user.id, property_type, &payload).await?;
    invalidate_property(&state, property_id).await;

    Ok(Json(ApiResponse::success("Property updated", property)))
}

/// DELETE /api/properties/{id}
pub async fn delete_property(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let outcome = PropertyRepository::delete(&state.db, property_id, user.id).await?;
    invalidate_property(&state, property_id).await;

    let message = match outcome {
        DeleteOutcome::Deactivated => "Property has bookings and was deactivated",
        DeleteOutcome::Deleted => "Property deleted",
    };
    tracing::info!("Host {} removed property {} ({:?})", user.id, property_id, outcome);

    Ok(Json(ApiResponse::success(
        message,
        serde_json::json!({
            "id": property_id,
            "deactivated": outcome == DeleteOutcome::Deactivated,
        }),
    )))
}

/// GET /api/host/properties
pub async fn list_host_properties(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Vec<Property>>>> {
    let properties = PropertyRepository::list_by_host(&state.db, user.id).await?;
    Ok(Json(ApiResponse::success("Host properties retrieved", properties)))
}

/// GET /api/categories
pub async fn get_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<PropertyCategory>>>> {
    let categories = CategoryRepository::list(&state.db).await?;
    Ok(Json(ApiResponse::success("Categories retrieved", categories)))
}

// ===== IMAGES =====

/// POST /api/upload/images
pub async fn upload_images(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadedImagesResponse>)> {
    let urls = state.uploader.upload_images(multipart, user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadedImagesResponse {
            success: true,
            message: format!("{} image(s) uploaded", urls.len()),
            urls,
        }),
    ))
}

/// DELETE /api/upload/images/{user_id}/{file_name}
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((owner, file_name)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    state.uploader.delete_image(user.id, &owner, &file_name).await?;

    Ok(Json(ApiResponse::success(
        "Image deleted",
        serde_json::json!({ "file_name": file_name }),
    )))
}

// ===== REVIEWS =====

/// GET /api/properties/{id}/reviews
pub async fn get_property_reviews(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<PropertyReviewsResponse>> {
    let (reviews, stats) = ReviewRepository::list_for_property(&state.db, property_id).await?;

    Ok(Json(PropertyReviewsResponse {
        success: true,
        data: reviews,
        stats,
    }))
}

/// POST /api/bookings/{booking_id}/review
pub async fn create_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    payload.validate()?;

    let review = ReviewRepository::create(&state.db, booking_id, user.id, &payload).await?;
    tracing::info!("Review {} created for booking {}", review.id, booking_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Review submitted", review)),
    ))
}

/// POST /api/reviews/{id}/reply
pub async fn reply_to_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(review_id): Path<Uuid>,
    Json(payload): Json<ReplyReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    payload.validate()?;
    if payload.reply.trim().is_empty() {
        return Err(AppError::ValidationError("Reply cannot be blank".to_string()));
    }

    let review = ReviewRepository::reply(&state.db, review_id, user.id, &payload.reply).await?;
    Ok(Json(ApiResponse::success("Reply saved", review)))
}

// ===== PROFILES =====

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = ProfileRepository::get(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(ApiResponse::success("Profile retrieved", profile)))
}

/// PUT /api/profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpsertProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    payload.validate()?;

    let profile = ProfileRepository::upsert(&state.db, user.id, &payload).await?;
    Ok(Json(ApiResponse::success("Profile saved", profile)))
}

// ===== SYSTEM =====

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = match ProfileRepository::ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            false
        }
    };

    let status = if database_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(serde_json::json!({
            "status": if database_ok { "healthy" } else { "unhealthy" },
            "service": "property-service",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database_ok,
            "cache": state.cache.get_stats().await,
            "timestamp": chrono::Utc::now(),
        })),
    )
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
