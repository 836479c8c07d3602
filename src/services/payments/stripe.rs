use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    header_str, http_client, string_field, CheckoutRequest, CheckoutSession, PaymentError,
    PaymentProvider, WebhookEvent,
};
use crate::constants::stripe::{API_BASE, SIGNATURE_HEADER, SIGNATURE_TOLERANCE_SECS};
use crate::services::signing::verify_hmac_sha256_hex;

/// Stripe Checkout through the REST API.
pub struct StripeProvider {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    success_url: String,
    cancel_url: String,
}

impl std::fmt::Debug for StripeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeProvider")
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .field("webhook_secret_set", &self.webhook_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl StripeProvider {
    pub fn new(
        secret_key: &str,
        webhook_secret: Option<&str>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<Self, PaymentError> {
        Ok(Self {
            client: http_client()?,
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.map(str::to_string),
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        })
    }

    fn checkout_form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        checkout_form(request, &self.success_url, &self.cancel_url)
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{API_BASE}/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&self.checkout_form(request))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(PaymentError::Upstream(format!("Stripe returned {status}: {message}")));
        }

        info!(
            session_id = body["id"].as_str().unwrap_or_default(),
            book_id = %request.book_id,
            "Created Stripe checkout session"
        );

        Ok(CheckoutSession {
            provider: self.name().to_string(),
            data: serde_json::json!({
                "session_id": body["id"],
                "url": body["url"],
                "amount_cents": request.amount_cents,
                "currency": request.currency,
            }),
        })
    }

    fn verify_webhook(&self, payload: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| PaymentError::NotConfigured("STRIPE_WEBHOOK_SECRET is not set".to_string()))?;
        let header = header_str(headers, SIGNATURE_HEADER)
            .ok_or_else(|| PaymentError::InvalidSignature("missing Stripe-Signature header".to_string()))?;

        verify_signature(payload, header, secret, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
fn checkout_form(
    request: &CheckoutRequest,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("success_url", success_url.to_string()),
        ("cancel_url", cancel_url.to_string()),
        ("client_reference_id", request.user_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        (
            "line_items[0][price_data][currency]",
            request.currency.to_lowercase(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            request.book_title.clone(),
        ),
        ("metadata[user_id]", request.user_id.clone()),
        ("metadata[book_id]", request.book_id.clone()),
        ("payment_intent_data[metadata][user_id]", request.user_id.clone()),
        ("payment_intent_data[metadata][book_id]", request.book_id.clone()),
    ]
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw body.
pub(crate) fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("malformed timestamp".to_string()))?;
    if (now - issued_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    if signatures
        .iter()
        .any(|candidate| verify_hmac_sha256_hex(secret, &signed, candidate))
    {
        Ok(())
    } else {
        debug!("No Stripe v1 signature matched");
        Err(PaymentError::InvalidSignature("signature mismatch".to_string()))
    }
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: Value =
        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
    let kind = string_field(&event, "type")
        .ok_or_else(|| PaymentError::InvalidPayload("missing event type".to_string()))?;
    let object = &event["data"]["object"];
    let metadata = &object["metadata"];

    let succeeded = match kind.as_str() {
        "checkout.session.completed" => object
            .get("payment_status")
            .and_then(Value::as_str)
            .map_or(true, |status| status == "paid"),
        "payment_intent.succeeded" => true,
        _ => false,
    };

    let amount_cents = ["amount_total", "amount_received", "amount"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_i64));

    Ok(WebhookEvent {
        succeeded,
        transaction_id: string_field(object, "payment_intent").or_else(|| string_field(object, "id")),
        user_id: string_field(metadata, "user_id"),
        book_id: string_field(metadata, "book_id"),
        amount_cents,
        currency: string_field(object, "currency").map(|c| c.to_uppercase()),
        kind,
    })
}
