//! # Payments API Integration Tests
//!
//! Checkout initiation and webhook processing through the mock and Stripe
//! providers. No request leaves the machine.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct Shop {
    server: TestServer,
    reader: String,
    user_id: String,
    book_id: String,
}

async fn shop_with(configure: impl FnOnce(&mut kindleplus::AppConfig)) -> Shop {
    let server = TestServer::start_with(configure).await;
    let admin = server.register_admin("admin@example.com").await;
    let book = server
        .create_book(
            &admin,
            json!({"title": "Emma", "author": "Jane Austen", "price_cents": 499}),
        )
        .await;
    let reader = server.register("reader@example.com").await;
    let me = json_body(server.get("/auth/me", Some(&reader)).await).await;

    Shop {
        user_id: me["id"].as_str().unwrap().to_string(),
        book_id: book["id"].as_str().unwrap().to_string(),
        reader,
        server,
    }
}

async fn webhook(server: &TestServer, body: String, headers: &[(&str, String)]) -> reqwest::Response {
    let mut request = server
        .request(reqwest::Method::POST, "/payments/webhook", None)
        .header("content-type", "application/json")
        .body(body);
    for (name, value) in headers {
        request = request.header(*name, value);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_mock_checkout_session() {
    let shop = shop_with(|_| {}).await;

    let response = shop
        .server
        .post(
            "/payments/init",
            Some(&shop.reader),
            &json!({"book_id": shop.book_id, "currency": "EUR"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = json_body(response).await;
    assert_eq!(session["provider"], "mock");
    assert_eq!(session["data"]["amount_cents"], 499);
    assert_eq!(session["data"]["currency"], "EUR");
    assert_eq!(session["data"]["metadata"]["user_id"], shop.user_id.as_str());

    let response = shop
        .server
        .post(
            "/payments/init",
            Some(&shop.reader),
            &json!({"book_id": "missing"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = shop
        .server
        .post("/payments/init", None, &json!({"book_id": shop.book_id}))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mock_webhook_records_purchase_once() {
    let shop = shop_with(|_| {}).await;
    let event = json!({
        "type": "payment.succeeded",
        "data": {"transaction_id": "tx_123", "user_id": shop.user_id, "book_id": shop.book_id},
    })
    .to_string();

    let response = webhook(&shop.server, event.clone(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(first["status"], "ok");
    let purchase_id = first["purchase_id"].as_str().unwrap().to_string();

    // Replays are idempotent
    let second = json_body(webhook(&shop.server, event, &[]).await).await;
    assert_eq!(second["purchase_id"], purchase_id.as_str());

    let purchases = json_body(shop.server.get("/purchases", Some(&shop.reader)).await).await;
    assert_eq!(purchases["meta"]["total"], 1);
    assert_eq!(purchases["items"][0]["transaction_id"], "tx_123");
    assert_eq!(purchases["items"][0]["price_cents"], 499);

    let library = json_body(shop.server.get("/library", Some(&shop.reader)).await).await;
    assert_eq!(library["items"][0]["source"], "purchase");

    // A different transaction for an owned book returns the existing purchase
    let event = json!({
        "type": "payment.succeeded",
        "data": {"transaction_id": "tx_456", "user_id": shop.user_id, "book_id": shop.book_id},
    })
    .to_string();
    let third = json_body(webhook(&shop.server, event, &[]).await).await;
    assert_eq!(third["purchase_id"], purchase_id.as_str());
}

#[tokio::test]
async fn test_webhook_without_usable_data() {
    let shop = shop_with(|_| {}).await;

    // Empty body: successful event with no metadata to record
    let response = webhook(&shop.server, String::new(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response).await;
    assert_eq!(body, json!({"status": "ok"}));

    let event = json!({"type": "payment.succeeded", "data": {}}).to_string();
    let body = json_body(webhook(&shop.server, event, &[]).await).await;
    assert_eq!(body, json!({"status": "ignored"}));

    let event = json!({
        "type": "payment.failed",
        "data": {"transaction_id": "tx_9", "user_id": shop.user_id, "book_id": shop.book_id},
    })
    .to_string();
    let body = json_body(webhook(&shop.server, event, &[]).await).await;
    assert_eq!(body, json!({"status": "ok"}));

    let response = webhook(&shop.server, "{not json".to_string(), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let event = json!({
        "type": "payment.succeeded",
        "data": {
            "transaction_id": "tx_negative",
            "user_id": shop.user_id,
            "book_id": shop.book_id,
            "amount_cents": -500,
        },
    })
    .to_string();
    let response = webhook(&shop.server, event, &[]).await;
    assert_eq!(error_code(response, StatusCode::BAD_REQUEST).await, "BAD_REQUEST");

    let purchases = json_body(shop.server.get("/purchases", Some(&shop.reader)).await).await;
    assert_eq!(purchases["meta"]["total"], 0);
}

#[tokio::test]
async fn test_concurrent_webhooks_all_record() {
    let shop = shop_with(|_| {}).await;
    let admin = shop.server.register_admin("admin2@example.com").await;

    let mut events = Vec::new();
    for i in 0..8 {
        let book = shop
            .server
            .create_book(
                &admin,
                json!({"title": format!("Volume {i}"), "author": "Anon", "price_cents": 100}),
            )
            .await;
        events.push(
            json!({
                "type": "payment.succeeded",
                "data": {
                    "transaction_id": format!("tx_concurrent_{i}"),
                    "user_id": shop.user_id,
                    "book_id": book["id"],
                },
            })
            .to_string(),
        );
    }

    let tasks: Vec<_> = events
        .into_iter()
        .map(|event| {
            let request = shop
                .server
                .request(reqwest::Method::POST, "/payments/webhook", None)
                .header("content-type", "application/json")
                .body(event);
            tokio::spawn(request.send())
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["purchase_id"].is_string());
    }

    let purchases = json_body(shop.server.get("/purchases", Some(&shop.reader)).await).await;
    assert_eq!(purchases["meta"]["total"], 8);
}

#[tokio::test]
async fn test_webhook_with_single_connection_pool() {
    let shop = shop_with(|config| config.database_max_connections = 1).await;
    let event = json!({
        "type": "payment.succeeded",
        "data": {"transaction_id": "tx_single", "user_id": shop.user_id, "book_id": shop.book_id},
    })
    .to_string();

    let response = webhook(&shop.server, event, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["purchase_id"].is_string());
}

fn stripe_signature(secret: &str, timestamp: i64, body: &str) -> String {
    let mac = hmac_sha256::HMAC::mac(format!("{timestamp}.{body}").as_bytes(), secret.as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac))
}

#[tokio::test]
async fn test_stripe_webhook_signature() {
    let secret = "whsec_integration";
    let shop = shop_with(|config| {
        config.payment_provider = "stripe".to_string();
        config.stripe_secret_key = Some("sk_test_integration".to_string());
        config.stripe_webhook_secret = Some(secret.to_string());
    })
    .await;

    let event = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_1",
            "payment_intent": "pi_123",
            "payment_status": "paid",
            "amount_total": 499,
            "currency": "usd",
            "metadata": {"user_id": shop.user_id, "book_id": shop.book_id},
        }},
    })
    .to_string();

    let now = chrono::Utc::now().timestamp();
    let forged = stripe_signature("wrong-secret", now, &event);
    let response = webhook(
        &shop.server,
        event.clone(),
        &[("stripe-signature", forged)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = webhook(&shop.server, event.clone(), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let signature = stripe_signature(secret, now, &event);
    let response = webhook(&shop.server, event, &[("stripe-signature", signature)]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");

    let purchases = json_body(shop.server.get("/purchases", Some(&shop.reader)).await).await;
    assert_eq!(purchases["items"][0]["transaction_id"], "pi_123");
    assert_eq!(purchases["items"][0]["currency"], "USD");
}
