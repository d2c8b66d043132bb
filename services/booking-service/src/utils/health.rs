// /stayhub/services/booking-service/src/utils/health.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::{repository::Repository, utils::scheduler::SchedulerMetrics};

#[derive(Debug, serde::Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, serde::Serialize, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
}

/// Database and scheduler health for `/health`
pub async fn comprehensive_health_check(
    repository: &Arc<Repository>,
    scheduler_metrics: &Arc<SchedulerMetrics>,
) -> HealthCheckResult {
    let mut checks = HashMap::new();

    checks.insert("database".to_string(), check_database_health(repository).await);
    checks.insert("scheduler".to_string(), check_scheduler(scheduler_metrics).await);

    HealthCheckResult {
        status: determine_overall_status(&checks),
        checks,
        timestamp: chrono::Utc::now(),
    }
}

async fn check_database_health(repository: &Arc<Repository>) -> ComponentHealth {
    let start = std::time::Instant::now();

    match sqlx::query("SELECT 1").fetch_one(&repository.pool).await {
        Ok(_) => ComponentHealth {
            name: "PostgreSQL".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            details: None,
        },
        Err(e) => ComponentHealth {
            name: "PostgreSQL".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(format!("Database error: {}", e)),
            response_time_ms: None,
            details: None,
        },
    }
}

async fn check_scheduler(metrics: &Arc<SchedulerMetrics>) -> ComponentHealth {
    let status = metrics.get_status().await;
    let failing = status["expiry_errors"].as_u64().unwrap_or(0) > status["expiry_runs"].as_u64().unwrap_or(0);

    ComponentHealth {
        name: "Background jobs".to_string(),
        status: if failing { HealthStatus::Degraded } else { HealthStatus::Healthy },
        message: None,
        response_time_ms: None,
        details: Some(status),
    }
}

fn determine_overall_status(checks: &HashMap<String, ComponentHealth>) -> HealthStatus {
    if checks.values().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.values().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: HealthStatus) -> ComponentHealth {
        ComponentHealth {
            name: "x".to_string(),
            status,
            message: None,
            response_time_ms: None,
            details: None,
        }
    }

    #[test]
    fn test_overall_status_takes_worst_component() {
        let mut checks = HashMap::new();
        checks.insert("a".to_string(), component(HealthStatus::Healthy));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Healthy);

        checks.insert("b".to_string(), component(HealthStatus::Degraded));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);

        checks.insert("c".to_string(), component(HealthStatus::Unhealthy));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Unhealthy);
    }
}
