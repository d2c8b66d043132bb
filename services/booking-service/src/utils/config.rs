// /stayhub/services/booking-service/src/utils/config.rs

use std::env;
use std::str::FromStr;

use crate::utils::error::{AppError, AppResult};

/// Runtime configuration read from the environment (and `.env` via dotenvy)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub run_migrations: bool,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub frontend_base_url: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub stripe_webhook_secret: Option<String>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: i64,
    pub pending_booking_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Configuration(
                "JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }

        let pending_booking_ttl_hours: i64 = env_or("PENDING_BOOKING_TTL_HOURS", 24);
        if !(1..=i64::from(i32::MAX)).contains(&pending_booking_ttl_hours) {
            return Err(AppError::Configuration(format!(
                "PENDING_BOOKING_TTL_HOURS must be between 1 and {}",
                i32::MAX
            )));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            database_acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 3),
            run_migrations: env_or("RUN_MIGRATIONS", false),
            host: env_or("SERVER_HOST", "0.0.0.0".to_string()),
            port: env::var("BOOKING_SERVICE_PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3003),
            environment: env_or("ENVIRONMENT", "development".to_string()).to_lowercase(),
            allowed_origins: parse_list(&env_or(
                "ALLOWED_ORIGINS",
                "http://localhost:8080".to_string(),
            )),
            frontend_base_url: env_or("FRONTEND_BASE_URL", "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            jwt_secret,
            jwt_audience: env_or("JWT_AUDIENCE", "authenticated".to_string()),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            rate_limit_max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", 100),
            rate_limit_window_seconds: env_or("RATE_LIMIT_WINDOW_SECONDS", 60),
            pending_booking_ttl_hours,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Redirect base for checkout: the caller's origin when we trust it
    pub fn checkout_origin(&self, request_origin: Option<&str>) -> String {
        match request_origin {
            Some(origin) if self.allowed_origins.iter().any(|o| o == origin) => {
                origin.trim_end_matches('/').to_string()
            }
            _ => self.frontend_base_url.clone(),
        }
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Configuration(format!("{} must be set", key)))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/stayhub_test".to_string(),
        database_max_connections: 1,
        database_acquire_timeout_secs: 1,
        run_migrations: false,
        host: "127.0.0.1".to_string(),
        port: 3003,
        environment: "development".to_string(),
        allowed_origins: vec!["http://localhost:8080".to_string()],
        frontend_base_url: "https://stayhub.example".to_string(),
        jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
        jwt_audience: "authenticated".to_string(),
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_api_base: "https://api.stripe.com/v1".to_string(),
        stripe_webhook_secret: Some("whsec_test".to_string()),
        rate_limit_max_requests: 100,
        rate_limit_window_seconds: 60,
        pending_booking_ttl_hours: 24,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_list_trims_and_drops_empty() {
        assert_eq!(
            parse_list("http://a.test/, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_checkout_origin_only_trusts_allowed_origins() {
        let config = test_config();
        assert_eq!(
            config.checkout_origin(Some("http://localhost:8080")),
            "http://localhost:8080"
        );
        assert_eq!(
            config.checkout_origin(Some("https://evil.example")),
            "https://stayhub.example"
        );
        assert_eq!(config.checkout_origin(None), "https://stayhub.example");
    }

    #[test]
    #[serial]
    fn test_from_env_requires_secrets() {
        env::set_var("DATABASE_URL", "postgres://localhost/stayhub");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_abc");
        env::set_var("JWT_SECRET", "short");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Configuration(_))));

        env::set_var("JWT_SECRET", "a-long-enough-secret-for-hs256-signing");
        env::set_var("BOOKING_SERVICE_PORT", "4100");
        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.port, 4100);
        assert_eq!(config.pending_booking_ttl_hours, 24);

        env::remove_var("BOOKING_SERVICE_PORT");
        env::remove_var("STRIPE_SECRET_KEY");
        assert!(AppConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_pending_ttl_must_fit_the_interval() {
        env::set_var("DATABASE_URL", "postgres://localhost/stayhub");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_abc");
        env::set_var("JWT_SECRET", "a-long-enough-secret-for-hs256-signing");

        for bad in ["0", "-5", "4294967296"] {
            env::set_var("PENDING_BOOKING_TTL_HOURS", bad);
            assert!(matches!(AppConfig::from_env(), Err(AppError::Configuration(_))), "{}", bad);
        }

        env::set_var("PENDING_BOOKING_TTL_HOURS", "48");
        assert_eq!(AppConfig::from_env().unwrap().pending_booking_ttl_hours, 48);

        env::remove_var("PENDING_BOOKING_TTL_HOURS");
        env::remove_var("STRIPE_SECRET_KEY");
    }
}
