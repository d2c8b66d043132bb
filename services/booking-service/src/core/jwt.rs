// /stayhub/services/booking-service/src/core/jwt.rs

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuthUser;
use crate::utils::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// Claims carried by identity-provider access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    pub aud: String,
}

/// Verifies bearer tokens locally with the shared HS256 secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.validate_exp = true;
        validation.leeway = 60;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_audience)
    }

    /// Decode a token and turn its claims into the caller identity
    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Token subject is not a valid user id".to_string()))?;

        Ok(AuthUser {
            id,
            email: data.claims.email.filter(|e| !e.is_empty()),
            role: data.claims.role.unwrap_or_else(|| "authenticated".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    fn token_for(sub: &str, aud: &str, expires_in: Duration) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("guest@stayhub.example".to_string()),
            role: Some("authenticated".to_string()),
            exp: (Utc::now() + expires_in).timestamp() as usize,
            iat: Some(Utc::now().timestamp() as usize),
            aud: aud.to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token_yields_user() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let user_id = Uuid::new_v4();

        let user = verifier
            .verify(&token_for(&user_id.to_string(), "authenticated", Duration::hours(1)))
            .unwrap();

        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("guest@stayhub.example"));
    }

    #[test]
    fn test_rejects_expired_wrong_audience_and_bad_subject() {
        let verifier = JwtVerifier::new(SECRET, "authenticated");
        let sub = Uuid::new_v4().to_string();

        assert!(verifier.verify(&token_for(&sub, "authenticated", Duration::hours(-2))).is_err());
        assert!(verifier.verify(&token_for(&sub, "anon", Duration::hours(1))).is_err());
        assert!(verifier.verify(&token_for("not-a-uuid", "authenticated", Duration::hours(1))).is_err());
        assert!(verifier.verify("garbage").is_err());
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let verifier = JwtVerifier::new("another-secret-that-is-also-32-chars-long", "authenticated");
        let token = token_for(&Uuid::new_v4().to_string(), "authenticated", Duration::hours(1));
        assert!(matches!(verifier.verify(&token), Err(AppError::Unauthorized(_))));
    }
}
