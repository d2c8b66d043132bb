// /stayhub/services/booking-service/src/core/stripe.rs

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::{
    models::*,
    utils::{
        config::AppConfig,
        error::{AppError, AppResult},
    },
};

/// Seconds a webhook signature stays acceptable
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Everything needed to open a hosted checkout page for one booking
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    pub booking_id: String,
    pub user_id: String,
    pub product_name: String,
    pub description: String,
    pub unit_amount: i64,
    pub currency: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionParams {
    /// Form-encoded body in the processor's bracketed key convention
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), self.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), self.product_name.clone()),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                self.description.clone(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("metadata[booking_id]".to_string(), self.booking_id.clone()),
            ("metadata[user_id]".to_string(), self.user_id.clone()),
        ];

        // An existing customer wins over a bare email
        if let Some(customer) = &self.customer {
            form.push(("customer".to_string(), customer.clone()));
        } else if let Some(email) = &self.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }

        form
    }
}

/// Payment processor operations used by checkout and verification
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> AppResult<Option<ProcessorCustomer>>;

    async fn create_checkout_session(&self, params: &CheckoutSessionParams) -> AppResult<CheckoutSession>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession>;
}

/// HTTP client for the Stripe REST API
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: String, base_url: String) -> AppResult<Self> {
        if secret_key.trim().is_empty() {
            return Err(AppError::Configuration("STRIPE_SECRET_KEY is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::new(config.stripe_secret_key.clone(), config.stripe_api_base.clone())
    }

    fn auth_header(&self) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("{}:", self.secret_key))
        )
    }

    /// Decode a processor response, surfacing its error message on failure
    async fn read_response<T: DeserializeOwned>(response: reqwest::Response, action: &str) -> AppResult<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProcessorErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);

            tracing::warn!("Stripe {} failed with {}: {}", action, status, message);

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(AppError::NotFound(format!("Stripe {}: {}", action, message)));
            }
            return Err(AppError::ExternalService(format!("Stripe {} error: {}", action, message)));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse Stripe {} response: {}", action, e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> AppResult<Option<ProcessorCustomer>> {
        let response = self.client
            .get(format!("{}/customers", self.base_url))
            .header("Authorization", self.auth_header())
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;

        let customers: CustomerList = Self::read_response(response, "customer lookup").await?;
        Ok(customers.data.into_iter().next())
    }

    async fn create_checkout_session(&self, params: &CheckoutSessionParams) -> AppResult<CheckoutSession> {
        let response = self.client
            .post(format!("{}/checkout/sessions", self.base_url))
            .header("Authorization", self.auth_header())
            .form(&params.to_form())
            .send()
            .await?;

        let session: CheckoutSession = Self::read_response(response, "checkout session").await?;

        tracing::debug!("Stripe checkout session {} opened for booking {}", session.id, params.booking_id);
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        let response = self.client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Self::read_response(response, "session retrieval").await
    }
}

/// Check a `Stripe-Signature` header (`t=...,v1=...`) against the raw body
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Unauthorized("Webhook signature has no timestamp".to_string()))?;

    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(AppError::Unauthorized("Webhook signature timestamp outside tolerance".to_string()));
    }

    for candidate in signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::Unauthorized("Webhook signature mismatch".to_string()))
}

#[cfg(test)]
pub(crate) fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn params() -> CheckoutSessionParams {
        CheckoutSessionParams {
            booking_id: "b-1".to_string(),
            user_id: "u-1".to_string(),
            product_name: "Booking: Sea View Loft".to_string(),
            description: "Booking reservation for Sea View Loft".to_string(),
            unit_amount: 39600,
            currency: "usd".to_string(),
            customer: None,
            customer_email: Some("guest@stayhub.example".to_string()),
            success_url: "https://stayhub.example/payment-success?session_id={CHECKOUT_SESSION_ID}&booking_id=b-1".to_string(),
            cancel_url: "https://stayhub.example/payment-canceled?booking_id=b-1".to_string(),
        }
    }

    #[test]
    fn test_form_prefers_existing_customer() {
        let mut p = params();
        assert!(p.to_form().iter().any(|(k, _)| k == "customer_email"));

        p.customer = Some("cus_123".to_string());
        let form = p.to_form();
        assert!(form.iter().any(|(k, v)| k == "customer" && v == "cus_123"));
        assert!(!form.iter().any(|(k, _)| k == "customer_email"));
    }

    #[tokio::test]
    async fn test_create_checkout_session_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/checkout/sessions")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mode".into(), "payment".into()),
                Matcher::UrlEncoded("metadata[booking_id]".into(), "b-1".into()),
                Matcher::UrlEncoded("line_items[0][price_data][unit_amount]".into(), "39600".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/c/cs_test_1","payment_status":"unpaid","metadata":{"booking_id":"b-1"}}"#)
            .create_async()
            .await;

        let client = StripeClient::new("sk_test_123".to_string(), server.url()).unwrap();
        let session = client.create_checkout_session(&params()).await.unwrap();

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.metadata.get("booking_id").map(String::as_str), Some("b-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_customer_lookup_returns_first_match() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/customers")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("email".into(), "guest@stayhub.example".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"object":"list","data":[{"id":"cus_9","email":"guest@stayhub.example"}]}"#)
            .create_async()
            .await;

        let client = StripeClient::new("sk_test_123".to_string(), server.url()).unwrap();
        let customer = client.find_customer_by_email("guest@stayhub.example").await.unwrap();
        assert_eq!(customer.map(|c| c.id), Some("cus_9".to_string()));
    }

    #[tokio::test]
    async fn test_processor_errors_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/checkout/sessions/cs_missing")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No such checkout.session","type":"invalid_request_error"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/checkout/sessions/cs_broken")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = StripeClient::new("sk_test_123".to_string(), server.url()).unwrap();
        assert!(matches!(
            client.retrieve_checkout_session("cs_missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            client.retrieve_checkout_session("cs_broken").await,
            Err(AppError::ExternalService(_))
        ));
    }

    #[test]
    fn test_webhook_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_750_000_000;
        let header = sign_webhook_payload(payload, "whsec_test", now);

        assert!(verify_webhook_signature(payload, &header, "whsec_test", now + 10).is_ok());
        assert!(verify_webhook_signature(payload, &header, "whsec_other", now).is_err());
        assert!(verify_webhook_signature(b"{}", &header, "whsec_test", now).is_err());
        assert!(verify_webhook_signature(payload, &header, "whsec_test", now + 301).is_err());
        assert!(verify_webhook_signature(payload, &header, "whsec_test", now + 301).is_err());
        assert!(verify_webhook_signature(payload, "v1=abc", "whsec_test", now).is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_750_000_000;

        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert!(matches!(
                verify_webhook_signature(payload, header, "whsec_test", now),
                Err(AppError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn test_empty_secret_key_is_rejected() {
        assert!(StripeClient::new("  ".to_string(), "https://api.stripe.com/v1".to_string()).is_err());
    }
}
