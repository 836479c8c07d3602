//! # Payment Providers
//!
//! A [`PaymentProvider`] creates checkout sessions and turns signed webhook
//! deliveries into a provider-neutral [`WebhookEvent`]. The active provider
//! is chosen from configuration; a provider whose credentials are missing
//! falls back to [`MockProvider`] with a warning.
//!
//! Sessions carry the buyer and book ids as provider metadata so the webhook
//! can record the purchase without any other state.

mod mock;
mod razorpay;
mod stripe;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{non_empty, AppConfig, PaymentProviderKind};

pub use mock::MockProvider;
pub use razorpay::RazorpayProvider;
pub use stripe::StripeProvider;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider not configured: {0}")]
    NotConfigured(String),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("payment provider request failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// What the buyer is paying for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub book_id: String,
    pub book_title: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// Provider-specific client payload for completing the payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub provider: String,
    pub data: Value,
}

/// A verified webhook delivery, normalised across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub kind: String,
    pub succeeded: bool,
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
    pub book_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    /// Authenticate the raw body against the provider's signature header and
    /// decode it.
    fn verify_webhook(&self, payload: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, PaymentError>;
}

/// Build the configured provider, falling back to the mock provider when the
/// selected one lacks credentials.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
    let kind = config
        .payment_provider_kind()
        .map_err(|e| PaymentError::NotConfigured(e.to_string()))?;

    match kind {
        PaymentProviderKind::Stripe => match non_empty(&config.stripe_secret_key) {
            Some(secret_key) => Ok(Arc::new(StripeProvider::new(
                secret_key,
                non_empty(&config.stripe_webhook_secret),
                &config.stripe_success_url,
                &config.stripe_cancel_url,
            )?)),
            None => {
                warn!("PAYMENT_PROVIDER=stripe but STRIPE_SECRET_KEY is unset; using mock provider");
                Ok(Arc::new(MockProvider))
            }
        },
        PaymentProviderKind::Razorpay => {
            match (
                non_empty(&config.razorpay_key_id),
                non_empty(&config.razorpay_key_secret),
            ) {
                (Some(key_id), Some(key_secret)) => Ok(Arc::new(RazorpayProvider::new(
                    key_id,
                    key_secret,
                    non_empty(&config.razorpay_webhook_secret),
                )?)),
                _ => {
                    warn!("PAYMENT_PROVIDER=razorpay but Razorpay keys are unset; using mock provider");
                    Ok(Arc::new(MockProvider))
                }
            }
        }
        PaymentProviderKind::Mock => Ok(Arc::new(MockProvider)),
    }
}

/// Shared HTTP client for provider APIs.
fn http_client() -> Result<reqwest::Client, PaymentError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .map_err(|e| PaymentError::NotConfigured(format!("failed to build HTTP client: {e}")))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Non-empty string at `key` of a JSON object.
fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
