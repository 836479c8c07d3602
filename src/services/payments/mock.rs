use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{string_field, CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, WebhookEvent};

const SUCCESS_EVENTS: [&str; 4] = [
    "payment.succeeded",
    "checkout.session.completed",
    "payment_intent.succeeded",
    "payment.captured",
];

/// Provider for development and tests. Sessions are fabricated locally and
/// webhooks are accepted unsigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        Ok(CheckoutSession {
            provider: self.name().to_string(),
            data: json!({
                "provider": self.name(),
                "session_id": format!("mock_sess_{}", Uuid::new_v4().simple()),
                "amount_cents": request.amount_cents,
                "currency": request.currency,
                "status": "created",
                "metadata": {
                    "user_id": request.user_id,
                    "book_id": request.book_id,
                },
            }),
        })
    }

    fn verify_webhook(&self, payload: &[u8], _headers: &HeaderMap) -> Result<WebhookEvent, PaymentError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(WebhookEvent {
                kind: "payment.succeeded".to_string(),
                succeeded: true,
                transaction_id: Some(format!("mock_{}", Uuid::new_v4())),
                ..WebhookEvent::default()
            });
        }

        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        let kind = string_field(&event, "type").unwrap_or_else(|| "payment.succeeded".to_string());
        let data = event.get("data").cloned().unwrap_or(Value::Null);
        let amount_cents = amount_field(&data)?;

        Ok(WebhookEvent {
            succeeded: SUCCESS_EVENTS.contains(&kind.as_str()),
            kind,
            transaction_id: string_field(&data, "transaction_id").or_else(|| string_field(&data, "id")),
            user_id: string_field(&data, "user_id"),
            book_id: string_field(&data, "book_id"),
            amount_cents,
            currency: string_field(&data, "currency"),
        })
    }
}

/// `data.amount_cents` must be a non-negative integer when present.
fn amount_field(data: &Value) -> Result<Option<i64>, PaymentError> {
    match data.get("amount_cents") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_i64() {
            Some(amount) if amount >= 0 => Ok(Some(amount)),
            _ => Err(PaymentError::InvalidPayload(format!(
                "amount_cents must be a non-negative integer, got {value}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_echoes_request() {
        let session = MockProvider
            .create_session(&CheckoutRequest {
                user_id: "u1".to_string(),
                book_id: "b1".to_string(),
                book_title: "Emma".to_string(),
                amount_cents: 499,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.provider, "mock");
        assert_eq!(session.data["status"], "created");
        assert_eq!(session.data["amount_cents"], 499);
        assert_eq!(session.data["metadata"]["book_id"], "b1");
        assert!(session.data["session_id"].as_str().unwrap().starts_with("mock_sess_"));
    }

    #[test]
    fn test_empty_body_is_a_fresh_success() {
        let first = MockProvider.verify_webhook(b"", &HeaderMap::new()).unwrap();
        let second = MockProvider.verify_webhook(b"  ", &HeaderMap::new()).unwrap();

        assert!(first.succeeded);
        assert_eq!(first.kind, "payment.succeeded");
        assert!(first.user_id.is_none());
        assert_ne!(first.transaction_id, second.transaction_id);
    }

    #[test]
    fn test_json_event_is_decoded() {
        let body = br#"{"type":"payment.succeeded","data":{"transaction_id":"tx_1","user_id":"u1","book_id":"b1","amount_cents":250,"currency":"EUR"}}"#;
        let event = MockProvider.verify_webhook(body, &HeaderMap::new()).unwrap();

        assert!(event.succeeded);
        assert_eq!(event.transaction_id.as_deref(), Some("tx_1"));
        assert_eq!(event.user_id.as_deref(), Some("u1"));
        assert_eq!(event.book_id.as_deref(), Some("b1"));
        assert_eq!(event.amount_cents, Some(250));
        assert_eq!(event.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_other_events_and_bad_json() {
        let event = MockProvider
            .verify_webhook(br#"{"type":"payment.failed","data":{"id":"tx_2"}}"#, &HeaderMap::new())
            .unwrap();
        assert!(!event.succeeded);
        assert_eq!(event.transaction_id.as_deref(), Some("tx_2"));

        assert!(matches!(
            MockProvider.verify_webhook(b"not json", &HeaderMap::new()),
            Err(PaymentError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_amount_must_be_non_negative_integer() {
        for body in [
            br#"{"data":{"transaction_id":"tx_3","amount_cents":-500}}"#.as_slice(),
            br#"{"data":{"transaction_id":"tx_3","amount_cents":"500"}}"#.as_slice(),
            br#"{"data":{"transaction_id":"tx_3","amount_cents":2.5}}"#.as_slice(),
        ] {
            assert!(matches!(
                MockProvider.verify_webhook(body, &HeaderMap::new()),
                Err(PaymentError::InvalidPayload(_))
            ));
        }

        let event = MockProvider
            .verify_webhook(br#"{"data":{"transaction_id":"tx_4","amount_cents":0}}"#, &HeaderMap::new())
            .unwrap();
        assert_eq!(event.amount_cents, Some(0));
    }
}
