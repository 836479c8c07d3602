use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{json, Value};
use tracing::info;

use super::{
    header_str, http_client, string_field, CheckoutRequest, CheckoutSession, PaymentError,
    PaymentProvider, WebhookEvent,
};
use crate::constants::razorpay::{API_BASE, SIGNATURE_HEADER};
use crate::services::signing::verify_hmac_sha256_hex;

/// Razorpay Orders through the REST API.
pub struct RazorpayProvider {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    webhook_secret: Option<String>,
}

impl std::fmt::Debug for RazorpayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayProvider")
            .field("key_id", &self.key_id)
            .field("webhook_secret_set", &self.webhook_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl RazorpayProvider {
    pub fn new(
        key_id: &str,
        key_secret: &str,
        webhook_secret: Option<&str>,
    ) -> Result<Self, PaymentError> {
        Ok(Self {
            client: http_client()?,
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            webhook_secret: webhook_secret.map(str::to_string),
        })
    }
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&order_body(request))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["description"].as_str().unwrap_or("unknown error");
            return Err(PaymentError::Upstream(format!("Razorpay returned {status}: {message}")));
        }

        info!(
            order_id = body["id"].as_str().unwrap_or_default(),
            book_id = %request.book_id,
            "Created Razorpay order"
        );

        Ok(CheckoutSession {
            provider: self.name().to_string(),
            data: json!({
                "order_id": body["id"],
                "key_id": self.key_id,
                "amount_cents": request.amount_cents,
                "currency": request.currency,
            }),
        })
    }

    fn verify_webhook(&self, payload: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, PaymentError> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            PaymentError::NotConfigured("RAZORPAY_WEBHOOK_SECRET is not set".to_string())
        })?;
        let signature = header_str(headers, SIGNATURE_HEADER).ok_or_else(|| {
            PaymentError::InvalidSignature("missing X-Razorpay-Signature header".to_string())
        })?;

        if !verify_hmac_sha256_hex(secret, payload, signature) {
            return Err(PaymentError::InvalidSignature("signature mismatch".to_string()));
        }

        parse_event(payload)
    }
}

fn order_body(request: &CheckoutRequest) -> Value {
    json!({
        "amount": request.amount_cents,
        "currency": request.currency.to_uppercase(),
        "receipt": format!("book_{}", request.book_id),
        "notes": {
            "user_id": request.user_id,
            "book_id": request.book_id,
        },
    })
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: Value =
        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
    let kind = string_field(&event, "event")
        .ok_or_else(|| PaymentError::InvalidPayload("missing event name".to_string()))?;

    let payment = &event["payload"]["payment"]["entity"];
    let order = &event["payload"]["order"]["entity"];

    // Razorpay sends `notes: []` when no notes were set.
    let note = |key: &str| string_field(&payment["notes"], key).or_else(|| string_field(&order["notes"], key));

    Ok(WebhookEvent {
        succeeded: matches!(kind.as_str(), "payment.captured" | "order.paid"),
        transaction_id: string_field(payment, "id"),
        user_id: note("user_id"),
        book_id: note("book_id"),
        amount_cents: payment.get("amount").and_then(Value::as_i64),
        currency: string_field(payment, "currency"),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signing::hmac_sha256_hex;
    use axum::http::HeaderValue;

    const SECRET: &str = "rzp_webhook_secret";

    fn signed_headers(payload: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&hmac_sha256_hex(SECRET, payload)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_order_body() {
        let body = order_body(&CheckoutRequest {
            user_id: "u1".to_string(),
            book_id: "b1".to_string(),
            book_title: "Kim".to_string(),
            amount_cents: 29900,
            currency: "inr".to_string(),
        });
        assert_eq!(body["amount"], 29900);
        assert_eq!(body["currency"], "INR");
        assert_eq!(body["notes"]["book_id"], "b1");
    }

    #[test]
    fn test_verify_webhook_signature() {
        let provider = RazorpayProvider::new("rzp_key", "rzp_secret", Some(SECRET)).unwrap();
        let payload = json!({
            "event": "payment.captured",
            "payload": {"payment": {"entity": {
                "id": "pay_1",
                "amount": 29900,
                "currency": "INR",
                "notes": {"user_id": "u1", "book_id": "b1"}
            }}}
        })
        .to_string();

        let event = provider
            .verify_webhook(payload.as_bytes(), &signed_headers(payload.as_bytes()))
            .unwrap();
        assert!(event.succeeded);
        assert_eq!(event.transaction_id.as_deref(), Some("pay_1"));
        assert_eq!(event.user_id.as_deref(), Some("u1"));
        assert_eq!(event.amount_cents, Some(29900));

        let tampered = payload.replace("29900", "100");
        assert!(matches!(
            provider.verify_webhook(tampered.as_bytes(), &signed_headers(payload.as_bytes())),
            Err(PaymentError::InvalidSignature(_))
        ));

        for bad in ["deadbeef", "not-hex"] {
            let mut headers = HeaderMap::new();
            headers.insert(SIGNATURE_HEADER, HeaderValue::from_static(bad));
            assert!(matches!(
                provider.verify_webhook(payload.as_bytes(), &headers),
                Err(PaymentError::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn test_notes_fall_back_to_order() {
        let payload = json!({
            "event": "order.paid",
            "payload": {
                "payment": {"entity": {"id": "pay_2", "notes": []}},
                "order": {"entity": {"id": "order_1", "notes": {"user_id": "u2", "book_id": "b2"}}}
            }
        })
        .to_string();

        let event = parse_event(payload.as_bytes()).unwrap();
        assert!(event.succeeded);
        assert_eq!(event.user_id.as_deref(), Some("u2"));
        assert_eq!(event.book_id.as_deref(), Some("b2"));
    }

    #[test]
    fn test_failed_payment_is_not_success() {
        let payload = json!({
            "event": "payment.failed",
            "payload": {"payment": {"entity": {"id": "pay_3"}}}
        })
        .to_string();
        assert!(!parse_event(payload.as_bytes()).unwrap().succeeded);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let provider = RazorpayProvider::new("rzp_key", "rzp_secret", None).unwrap();
        assert!(matches!(
            provider.verify_webhook(b"{}", &HeaderMap::new()),
            Err(PaymentError::NotConfigured(_))
        ));
    }
}
