// /stayhub/services/property-service/src/auth.rs

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::AuthUser;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
    pub aud: String,
}

pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.leeway = 60;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_audience)
    }

    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Token subject is not a valid user id".to_string()))?;

        Ok(AuthUser {
            id,
            role: data.claims.role.unwrap_or_else(|| "authenticated".to_string()),
        })
    }
}

/// Routes readable without a token. Property detail still takes an
/// optional token so hosts can see their own inactive listings.
fn is_public(method: &Method, path: &str) -> bool {
    if path == "/health" || path.starts_with("/storage/") {
        return true;
    }

    method == Method::GET
        && (path == "/api/properties"
            || path == "/api/categories"
            || (path.starts_with("/api/properties/") && path.matches('/').count() <= 4))
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let public = is_public(req.method(), req.uri().path());

    match bearer_token(&req) {
        Some(token) => match state.jwt.verify(token) {
            Ok(user) => {
                tracing::debug!("Authenticated user {} ({})", user.id, user.role);
                req.extensions_mut().insert(user);
            }
            // A stale token on a public route is treated as anonymous
            Err(_) if public => {}
            Err(e) => return Err(e),
        },
        None if public => {}
        None => {
            return Err(AppError::Unauthorized(
                "Authorization header missing or invalid".to_string(),
            ))
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    fn token_for(sub: &str, expires_in: Duration) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            role: None,
            exp: (Utc::now() + expires_in).timestamp() as usize,
            aud: "authenticated".to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_token() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let id = Uuid::new_v4();

        let user = verifier.verify(&token_for(&id.to_string(), Duration::hours(1))).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, "authenticated");

        assert!(verifier.verify(&token_for(&id.to_string(), Duration::hours(-3))).is_err());
        assert!(verifier.verify(&token_for("nobody", Duration::hours(1))).is_err());
    }

    #[test]
    fn test_public_routes() {
        assert!(is_public(&Method::GET, "/api/properties"));
        assert!(is_public(&Method::GET, "/api/properties/8d1c0f4e-0000-0000-0000-000000000000"));
        assert!(is_public(&Method::GET, "/api/properties/8d1c0f4e-0000-0000-0000-000000000000/reviews"));
        assert!(is_public(&Method::GET, "/api/categories"));
        assert!(is_public(&Method::POST, "/health"));
        assert!(is_public(&Method::GET, "/storage/property-images/u/a.png"));

        assert!(!is_public(&Method::POST, "/api/properties"));
        assert!(!is_public(&Method::GET, "/api/host/properties"));
        assert!(!is_public(&Method::GET, "/api/profile"));
        assert!(!is_public(&Method::DELETE, "/api/properties/abc"));
    }
}
