// /stayhub/services/booking-service/src/middleware/auth.rs

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};

use crate::{models::ErrorResponse, AppState};

/// Verify the bearer token and attach the caller as `AuthUser`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let path = req.uri().path().to_string();

    if is_public_endpoint(req.method(), &path) {
        return Ok(next.run(req).await);
    }

    let token = match bearer_token(req.headers()) {
        Some(token) => token,
        None => {
            tracing::debug!("Request to {} rejected: missing authorization header", path);
            return Err(unauthorized("Authorization header required", "MISSING_TOKEN"));
        }
    };

    let user = state.jwt.verify(&token).map_err(|_| {
        tracing::debug!("Request to {} rejected: invalid token", path);
        unauthorized("Invalid or expired token", "INVALID_TOKEN")
    })?;

    tracing::debug!("Authenticated user={} role={} path={}", user.id, user.role, path);

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn unauthorized(message: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            success: false,
            message: message.to_string(),
            error_code: Some(code.to_string()),
            details: None,
        }),
    )
}

/// Endpoints that do not need a signed-in user
fn is_public_endpoint(method: &Method, path: &str) -> bool {
    if path == "/health" || path.starts_with("/api/webhooks") {
        return true;
    }

    // Availability and quotes are shown on the public listing page
    *method == Method::GET
        && path.starts_with("/api/properties/")
        && (path.ends_with("/availability") || path.ends_with("/quote"))
}
