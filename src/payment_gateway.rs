use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as _;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::circuit_breaker::{create_payment_circuit_breaker, PaymentCircuitBreaker};
use crate::errors::AppError;
use crate::models::{PaymentMethod, PaymentPurpose, TransactionDetails};
use crate::normalize::{extract_transaction_details, first_i64, first_str};

/// Window in which identical payment attempts share one idempotency key.
pub const IDEMPOTENCY_WINDOW_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    pub vendor_booking_id: i64,
    pub vendor_id: i64,
    pub purpose: PaymentPurpose,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundDetails {
    pub id: String,
    pub amount_cents: Option<i64>,
    pub status: Option<String>,
}

/// Outbound payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<TransactionDetails, AppError>;

    async fn create_refund(&self, request: RefundRequest) -> Result<RefundDetails, AppError>;
}

/// Hex SHA-256 over the attempt, bucketed by [`IDEMPOTENCY_WINDOW_SECS`] so
/// a double click maps to one provider intent.
pub fn idempotency_key(
    vendor_booking_id: i64,
    vendor_id: i64,
    purpose: PaymentPurpose,
    amount_cents: i64,
    unix_secs: i64,
) -> String {
    let window = unix_secs.div_euclid(IDEMPOTENCY_WINDOW_SECS);
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}:{}:{}:{}:{}",
        vendor_booking_id,
        vendor_id,
        purpose.as_str(),
        amount_cents,
        window
    ));
    hex::encode(hasher.finalize())
}

/// Refunds of one intent for one amount always share a key.
pub fn refund_idempotency_key(payment_intent_id: &str, amount_cents: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("refund:{}:{}", payment_intent_id, amount_cents));
    hex::encode(hasher.finalize())
}

/// Provider error before it is mapped to [`AppError`]. `status` is `None`
/// for transport failures.
#[derive(Debug)]
struct ProviderFailure {
    status: Option<StatusCode>,
    message: String,
}

impl ProviderFailure {
    /// Whether the failure says something about provider health.
    fn is_outage(&self) -> bool {
        self.status.map_or(true, |s| s.is_server_error())
    }
}

/// Client for a Stripe-compatible payments API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: PaymentCircuitBreaker,
}

impl HttpPaymentGateway {
    /// Creates a new `HttpPaymentGateway`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider API root, e.g. `https://api.stripe.com`.
    /// * `api_key` - Secret key sent as a bearer token.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create payment client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            breaker: create_payment_circuit_breaker(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        idempotency_key: &str,
        form: &[(String, String)],
    ) -> Result<Value, ProviderFailure> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {} (idempotency key {})", url, idempotency_key);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderFailure {
                status: None,
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(ProviderFailure {
                status: Some(status),
                message: format!("returned {}: {}", status, message),
            });
        }

        response.json().await.map_err(|e| ProviderFailure {
            status: Some(status),
            message: format!("failed to parse response: {}", e),
        })
    }

    /// Runs a provider call through the circuit breaker.
    async fn call(
        &self,
        path: &str,
        idempotency_key: &str,
        form: Vec<(String, String)>,
    ) -> Result<Value, AppError> {
        let result = self
            .breaker
            .call_with(
                |f: &ProviderFailure| f.is_outage(),
                self.post_form(path, idempotency_key, &form),
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(failure)) => {
                tracing::error!("Payment provider {} {}", path, failure.message);
                Err(AppError::ExternalApiError(failure.message))
            }
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Payment provider circuit open, rejecting {}", path);
                Err(AppError::ExternalApiError(
                    "provider temporarily unavailable".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<TransactionDetails, AppError> {
        tracing::info!(
            "Creating {} payment intent for booking {} ({} {})",
            request.purpose.as_str(),
            request.vendor_booking_id,
            request.amount_cents,
            request.currency
        );

        let form = vec![
            ("amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "payment_method_types[]".to_string(),
                request.payment_method.provider_type().to_string(),
            ),
            (
                "metadata[vendor_booking_id]".to_string(),
                request.vendor_booking_id.to_string(),
            ),
            ("metadata[vendor_id]".to_string(), request.vendor_id.to_string()),
            (
                "metadata[purpose]".to_string(),
                request.purpose.as_str().to_string(),
            ),
        ];

        let body = self
            .call("/v1/payment_intents", &request.idempotency_key, form)
            .await?;

        extract_transaction_details(&body).ok_or_else(|| {
            AppError::ExternalApiError("payment intent response has no id".to_string())
        })
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<RefundDetails, AppError> {
        tracing::info!(
            "Refunding {} cents of {}",
            request.amount_cents,
            request.payment_intent_id
        );

        let form = vec![
            ("payment_intent".to_string(), request.payment_intent_id.clone()),
            ("amount".to_string(), request.amount_cents.to_string()),
        ];

        let body = self
            .call("/v1/refunds", &request.idempotency_key, form)
            .await?;

        let id = first_str(&body, &["id"]).ok_or_else(|| {
            AppError::ExternalApiError("refund response has no id".to_string())
        })?;

        Ok(RefundDetails {
            id: id.to_string(),
            amount_cents: first_i64(&body, &["amount"]),
            status: first_str(&body, &["status"]).map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let gateway = HttpPaymentGateway::new("https://example.com/".to_string(), "sk".to_string());
        assert_eq!(gateway.unwrap().base_url, "https://example.com");
    }

    #[test]
    fn test_idempotency_key_is_stable_within_window() {
        let a = idempotency_key(7, 3, PaymentPurpose::Booking, 10_000, 1_700_000_010);
        let b = idempotency_key(7, 3, PaymentPurpose::Booking, 10_000, 1_700_000_019);
        let c = idempotency_key(7, 3, PaymentPurpose::Reschedule, 10_000, 1_700_000_019);
        let d = idempotency_key(7, 3, PaymentPurpose::Booking, 10_000, 1_700_000_040);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_only_outages_trip_the_breaker() {
        let declined = ProviderFailure {
            status: Some(StatusCode::PAYMENT_REQUIRED),
            message: String::new(),
        };
        let down = ProviderFailure {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            message: String::new(),
        };
        let network = ProviderFailure {
            status: None,
            message: String::new(),
        };

        assert!(!declined.is_outage());
        assert!(down.is_outage());
        assert!(network.is_outage());
    }
}
