// /stayhub/services/booking-service/src/utils/scheduler.rs

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    core::services::BookingService,
    repository::{booking::ListScope, Repository},
    utils::error::{AppError, AppResult},
};

/// Audit rows older than this are pruned
pub const AUDIT_RETENTION_DAYS: i32 = 90;

const EXPIRE_PENDING_SCHEDULE: &str = "0 */15 * * * *";
const DAILY_STATS_SCHEDULE: &str = "0 0 0 * * *";
const AUDIT_PRUNE_SCHEDULE: &str = "0 0 * * * *";

/// Counters exposed on the health endpoint
pub struct SchedulerMetrics {
    pub expiry_runs: AtomicU64,
    pub expiry_errors: AtomicU64,
    pub bookings_expired: AtomicU64,
    pub stats_runs: AtomicU64,
    pub last_expiry: RwLock<Option<chrono::DateTime<Utc>>>,
}

impl SchedulerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            expiry_runs: AtomicU64::new(0),
            expiry_errors: AtomicU64::new(0),
            bookings_expired: AtomicU64::new(0),
            stats_runs: AtomicU64::new(0),
            last_expiry: RwLock::new(None),
        })
    }

    pub async fn get_status(&self) -> serde_json::Value {
        let last_expiry = self.last_expiry.read().await;
        serde_json::json!({
            "expiry_runs": self.expiry_runs.load(Ordering::Relaxed),
            "expiry_errors": self.expiry_errors.load(Ordering::Relaxed),
            "bookings_expired": self.bookings_expired.load(Ordering::Relaxed),
            "stats_runs": self.stats_runs.load(Ordering::Relaxed),
            "last_expiry": *last_expiry,
        })
    }
}

fn scheduler_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Configuration(format!("{}: {}", context, e))
}

/// Register and start the maintenance jobs
pub async fn start_background_jobs(
    repository: Arc<Repository>,
    booking_service: Arc<BookingService>,
    metrics: Arc<SchedulerMetrics>,
    pending_ttl_hours: i64,
) -> AppResult<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| scheduler_error("Failed to create scheduler", e))?;

    // Job 1: cancel pending bookings that were never paid
    let service = booking_service.clone();
    let expiry_metrics = metrics.clone();
    let expiry_job = Job::new_async(EXPIRE_PENDING_SCHEDULE, move |_uuid, _l| {
        let service = service.clone();
        let metrics = expiry_metrics.clone();
        Box::pin(async move {
            if let Err(e) = expire_pending_job(service, metrics, pending_ttl_hours).await {
                tracing::error!("Failed to expire stale pending bookings: {}", e);
            }
        })
    })
    .map_err(|e| scheduler_error("Failed to create expiry job", e))?;

    scheduler
        .add(expiry_job)
        .await
        .map_err(|e| scheduler_error("Failed to add expiry job", e))?;

    // Job 2: daily booking statistics in the log
    let repo = repository.clone();
    let stats_metrics = metrics.clone();
    let stats_job = Job::new_async(DAILY_STATS_SCHEDULE, move |_uuid, _l| {
        let repo = repo.clone();
        let metrics = stats_metrics.clone();
        Box::pin(async move {
            if let Err(e) = daily_stats_job(repo, metrics).await {
                tracing::error!("Failed to log daily stats: {}", e);
            }
        })
    })
    .map_err(|e| scheduler_error("Failed to create stats job", e))?;

    scheduler
        .add(stats_job)
        .await
        .map_err(|e| scheduler_error("Failed to add stats job", e))?;

    // Job 3: audit log retention
    let repo = repository.clone();
    let prune_job = Job::new_async(AUDIT_PRUNE_SCHEDULE, move |_uuid, _l| {
        let repo = repo.clone();
        Box::pin(async move {
            match repo.audit().prune_older_than(AUDIT_RETENTION_DAYS).await {
                Ok(0) => tracing::debug!("Audit prune: nothing to delete"),
                Ok(count) => tracing::info!("Audit prune: {} old rows deleted", count),
                Err(e) => tracing::error!("Audit prune failed: {}", e),
            }
        })
    })
    .map_err(|e| scheduler_error("Failed to create audit prune job", e))?;

    scheduler
        .add(prune_job)
        .await
        .map_err(|e| scheduler_error("Failed to add audit prune job", e))?;

    scheduler
        .start()
        .await
        .map_err(|e| scheduler_error("Failed to start scheduler", e))?;

    tracing::info!("✅ Background jobs scheduler started");

    Ok(scheduler)
}

async fn expire_pending_job(
    booking_service: Arc<BookingService>,
    metrics: Arc<SchedulerMetrics>,
    ttl_hours: i64,
) -> AppResult<()> {
    tracing::debug!("Starting stale pending booking expiry");

    match booking_service.expire_stale_pending(ttl_hours).await {
        Ok(count) => {
            metrics.expiry_runs.fetch_add(1, Ordering::Relaxed);
            metrics.bookings_expired.fetch_add(count as u64, Ordering::Relaxed);
            *metrics.last_expiry.write().await = Some(Utc::now());

            if count > 0 {
                tracing::info!("Cancelled {} pending bookings older than {}h", count, ttl_hours);
            }
            Ok(())
        }
        Err(e) => {
            metrics.expiry_errors.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

async fn daily_stats_job(repository: Arc<Repository>, metrics: Arc<SchedulerMetrics>) -> AppResult<()> {
    let stats = repository
        .booking()
        .stats(ListScope::All, Utc::now().date_naive())
        .await?;

    metrics.stats_runs.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        "Daily stats: {} bookings ({} pending, {} confirmed, {} in house), revenue {}",
        stats.total, stats.pending, stats.confirmed, stats.current, stats.revenue
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_expressions_are_accepted() {
        for expr in [EXPIRE_PENDING_SCHEDULE, DAILY_STATS_SCHEDULE, AUDIT_PRUNE_SCHEDULE] {
            let job = Job::new_async(expr, |_uuid, _l| Box::pin(async {}));
            assert!(job.is_ok(), "{} should be a valid schedule", expr);
        }
    }

    #[tokio::test]
    async fn test_metrics_status_starts_empty() {
        let metrics = SchedulerMetrics::new();
        metrics.expiry_runs.fetch_add(2, Ordering::Relaxed);

        let status = metrics.get_status().await;
        assert_eq!(status["expiry_runs"], 2);
        assert!(status["last_expiry"].is_null());
    }
}
