// /stayhub/services/booking-service/src/middleware/rate_limit.rs
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{models::ErrorResponse, AppState};

/// Per-client token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    max_requests: u32,
    window_seconds: i64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: u32,
    last_refill: chrono::DateTime<Utc>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: i64) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window_seconds: window_seconds.max(1),
        }
    }

    /// Periodically drop buckets nobody has touched for two windows
    pub fn spawn_cleanup(&self) {
        let buckets = self.buckets.clone();
        let window = self.window_seconds;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(window as u64 * 2));
            loop {
                interval.tick().await;
                let cutoff = Utc::now() - Duration::seconds(window * 2);
                buckets.write().await.retain(|_, bucket| bucket.last_refill > cutoff);
            }
        });
    }

    /// Take one token for `identifier`; false when the bucket is empty
    pub async fn check_rate_limit(&self, identifier: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Utc::now();

        let bucket = buckets.entry(identifier.to_string()).or_insert_with(|| TokenBucket {
            tokens: self.max_requests,
            last_refill: now,
        });

        let elapsed = (now - bucket.last_refill).num_seconds();
        if elapsed >= self.window_seconds {
            bucket.tokens = self.max_requests;
            bucket.last_refill = now;
        } else if elapsed > 0 {
            let refill_rate = self.max_requests as f64 / self.window_seconds as f64;
            let tokens_to_add = (elapsed as f64 * refill_rate) as u32;
            if tokens_to_add > 0 {
                bucket.tokens = (bucket.tokens + tokens_to_add).min(self.max_requests);
                bucket.last_refill = now;
            }
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_seconds
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let path = req.uri().path();

    // Health probes and processor webhooks are never throttled
    if path == "/health" || path.starts_with("/api/webhooks") {
        return Ok(next.run(req).await);
    }

    let identifier = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .or_else(|| req.headers().get("x-real-ip").and_then(|h| h.to_str().ok()))
        .unwrap_or("unknown")
        .trim()
        .to_string();

    if !state.rate_limiter.check_rate_limit(&identifier).await {
        tracing::warn!("Rate limit exceeded for: {}", identifier);

        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                success: false,
                message: "Too many requests. Please try again later.".to_string(),
                error_code: Some("RATE_LIMIT_EXCEEDED".to_string()),
                details: Some(serde_json::json!({
                    "retry_after_seconds": state.rate_limiter.window_seconds(),
                })),
            }),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_runs_dry_per_client() {
        tokio_test::block_on(async {
            let limiter = RateLimiter::new(3, 60);

            for _ in 0..3 {
                assert!(limiter.check_rate_limit("10.0.0.1").await);
            }
            assert!(!limiter.check_rate_limit("10.0.0.1").await);
            assert!(limiter.check_rate_limit("10.0.0.2").await);
        });
    }

    #[test]
    fn test_window_is_at_least_one_second() {
        assert_eq!(RateLimiter::new(10, 0).window_seconds(), 1);
    }
}
