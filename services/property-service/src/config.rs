// /stayhub/services/property-service/src/config.rs

use std::env;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

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
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub redis_url: Option<String>,
    pub storage_base_path: String,
    pub public_storage_url: String,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Configuration(
                "JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }

        let environment = env_or("ENVIRONMENT", "development".to_string()).to_lowercase();

        // Production only trusts its own origin list when one is given
        let origins_key = if environment == "production" && env::var("PRODUCTION_ORIGINS").is_ok() {
            "PRODUCTION_ORIGINS"
        } else {
            "ALLOWED_ORIGINS"
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            database_acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 3),
            run_migrations: env_or("RUN_MIGRATIONS", false),
            host: env_or("SERVER_HOST", "0.0.0.0".to_string()),
            port: env::var("PROPERTY_SERVICE_PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3002),
            allowed_origins: parse_list(&env_or(origins_key, "http://localhost:8080".to_string())),
            environment,
            jwt_secret,
            jwt_audience: env_or("JWT_AUDIENCE", "authenticated".to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            storage_base_path: env_or("STORAGE_BASE_PATH", "./storage".to_string()),
            public_storage_url: env_or("PUBLIC_STORAGE_URL", "http://localhost:3002/storage".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
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
pub(crate) fn test_config(storage_base_path: &str) -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/stayhub_test".to_string(),
        database_max_connections: 1,
        database_acquire_timeout_secs: 1,
        run_migrations: false,
        host: "127.0.0.1".to_string(),
        port: 3002,
        environment: "development".to_string(),
        allowed_origins: vec!["http://localhost:8080".to_string()],
        jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
        jwt_audience: "authenticated".to_string(),
        redis_url: None,
        storage_base_path: storage_base_path.to_string(),
        public_storage_url: "http://localhost:3002/storage".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults_and_validation() {
        env::set_var("DATABASE_URL", "postgres://localhost/stayhub");
        env::set_var("JWT_SECRET", "short");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Configuration(_))));

        env::set_var("JWT_SECRET", "a-long-enough-secret-for-hs256-signing");
        env::remove_var("PROPERTY_SERVICE_PORT");
        env::remove_var("SERVER_PORT");
        env::set_var("PUBLIC_STORAGE_URL", "https://cdn.stayhub.example/storage/");
        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.port, 3002);
        assert_eq!(config.public_storage_url, "https://cdn.stayhub.example/storage");
        env::remove_var("PUBLIC_STORAGE_URL");
    }

    #[test]
    #[serial]
    fn test_production_prefers_production_origins() {
        env::set_var("DATABASE_URL", "postgres://localhost/stayhub");
        env::set_var("JWT_SECRET", "a-long-enough-secret-for-hs256-signing");
        env::set_var("ENVIRONMENT", "Production");
        env::set_var("ALLOWED_ORIGINS", "http://localhost:8080");
        env::set_var("PRODUCTION_ORIGINS", "https://stayhub.example/, https://www.stayhub.example");

        let config = AppConfig::from_env().expect("config should load");
        assert!(config.is_production());
        assert_eq!(
            config.allowed_origins,
            vec!["https://stayhub.example".to_string(), "https://www.stayhub.example".to_string()]
        );

        env::remove_var("ENVIRONMENT");
        env::remove_var("PRODUCTION_ORIGINS");
        env::remove_var("ALLOWED_ORIGINS");
    }
}
