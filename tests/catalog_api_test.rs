//! # Catalog API Integration Tests
//!
//! Books and categories: admin-only writes, public search and paging.

mod common;

use common::*;
use reqwest::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let server = TestServer::start().await;
    let reader = server.register("reader@example.com").await;

    let response = server
        .post("/books", None, &json!({"title": "Dune", "author": "Frank Herbert"}))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .post(
            "/books",
            Some(&reader),
            &json!({"title": "Dune", "author": "Frank Herbert"}),
        )
        .await;
    assert_eq!(
        error_code(response, StatusCode::FORBIDDEN).await,
        "AUTHORIZATION_FAILED"
    );

    let response = server
        .post("/categories", Some(&reader), &json!({"name": "Sci-Fi"}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_book_lifecycle_with_categories() {
    let server = TestServer::start().await;
    let admin = server.register_admin("admin@example.com").await;

    let scifi = server.create_category(&admin, "Science Fiction").await;
    assert_eq!(scifi["slug"], "science-fiction");
    let classics = server.create_category(&admin, "Classics").await;

    let book = server
        .create_book(
            &admin,
            json!({
                "title": "Dune",
                "author": "Frank Herbert",
                "price_cents": 999,
                "isbn": "9780441013593",
                "category_ids": [scifi["id"], scifi["id"]],
            }),
        )
        .await;
    let book_id = book["id"].as_str().unwrap().to_string();
    assert_eq!(book["currency"], "USD");
    assert_eq!(book["categories"].as_array().unwrap().len(), 1);
    assert_eq!(book["categories"][0]["slug"], "science-fiction");

    let fetched = json_body(server.get(&format!("/books/{book_id}"), None).await).await;
    assert_eq!(fetched["title"], "Dune");

    let response = server
        .send_json(
            Method::PATCH,
            &format!("/books/{book_id}"),
            Some(&admin),
            &json!({"price_cents": 1299, "isbn": null, "category_ids": [classics["id"]]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["price_cents"], 1299);
    assert!(updated["isbn"].is_null());
    assert_eq!(updated["author"], "Frank Herbert");
    assert_eq!(updated["categories"][0]["name"], "Classics");

    let response = server.delete(&format!("/books/{book_id}"), Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server.get(&format!("/books/{book_id}"), None).await;
    assert_eq!(error_code(response, StatusCode::NOT_FOUND).await, "NOT_FOUND");

    let response = server.delete(&format!("/books/{book_id}"), Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_create_rejections() {
    let server = TestServer::start().await;
    let admin = server.register_admin("admin@example.com").await;

    let response = server
        .post(
            "/books",
            Some(&admin),
            &json!({"title": "Dune", "author": "Frank Herbert", "category_ids": ["nope"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server
        .create_book(
            &admin,
            json!({"title": "Dune", "author": "Frank Herbert", "isbn": "111"}),
        )
        .await;
    let response = server
        .post(
            "/books",
            Some(&admin),
            &json!({"title": "Dune Messiah", "author": "Frank Herbert", "isbn": "111"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = server
        .post(
            "/books",
            Some(&admin),
            &json!({"title": "", "author": "Nobody", "rating": 6.0}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_book_search_filters_and_paging() {
    let server = TestServer::start().await;
    let admin = server.register_admin("admin@example.com").await;
    let mystery = server.create_category(&admin, "Mystery").await;

    server
        .create_book(
            &admin,
            json!({"title": "The Hound of the Baskervilles", "author": "Arthur Conan Doyle",
                   "price_cents": 300, "category_ids": [mystery["id"]]}),
        )
        .await;
    server
        .create_book(
            &admin,
            json!({"title": "Emma", "author": "Jane Austen", "price_cents": 500}),
        )
        .await;
    server
        .create_book(
            &admin,
            json!({"title": "Persuasion", "author": "Jane Austen", "price_cents": 900}),
        )
        .await;

    let all = json_body(server.get("/books", None).await).await;
    assert_eq!(all["meta"]["total"], 3);

    let austen = json_body(server.get("/books?author=austen", None).await).await;
    assert_eq!(austen["meta"]["total"], 2);

    let hound = json_body(server.get("/books?q=hound", None).await).await;
    assert_eq!(hound["items"][0]["title"], "The Hound of the Baskervilles");

    let by_slug = json_body(server.get("/books?category_slug=mystery", None).await).await;
    assert_eq!(by_slug["meta"]["total"], 1);

    let priced = json_body(
        server
            .get("/books?price_min=400&price_max=900", None)
            .await,
    )
    .await;
    assert_eq!(priced["meta"]["total"], 2);

    let page = json_body(server.get("/books?page=2&page_size=2", None).await).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["meta"]["total_pages"], 2);

    let response = server.get("/books?price_min=-5", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_category_slug_rules() {
    let server = TestServer::start().await;
    let admin = server.register_admin("admin@example.com").await;

    let fantasy = server.create_category(&admin, "Fantasy").await;
    let id = fantasy["id"].as_str().unwrap().to_string();

    let response = server
        .post("/categories", Some(&admin), &json!({"name": "FANTASY!"}))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let by_slug = json_body(server.get("/categories/slug/fantasy", None).await).await;
    assert_eq!(by_slug["id"], fantasy["id"]);

    let renamed = json_body(
        server
            .send_json(
                Method::PATCH,
                &format!("/categories/{id}"),
                Some(&admin),
                &json!({"name": "Epic Fantasy"}),
            )
            .await,
    )
    .await;
    assert_eq!(renamed["slug"], "epic-fantasy");

    let custom = json_body(
        server
            .send_json(
                Method::PATCH,
                &format!("/categories/{id}"),
                Some(&admin),
                &json!({"slug": "epic"}),
            )
            .await,
    )
    .await;
    assert_eq!(custom["slug"], "epic");
    assert_eq!(custom["name"], "Epic Fantasy");

    let regenerated = json_body(
        server
            .send_json(
                Method::PATCH,
                &format!("/categories/{id}"),
                Some(&admin),
                &json!({"slug": ""}),
            )
            .await,
    )
    .await;
    assert_eq!(regenerated["slug"], "epic-fantasy");

    server.create_category(&admin, "Horror").await;
    let response = server
        .send_json(
            Method::PATCH,
            &format!("/categories/{id}"),
            Some(&admin),
            &json!({"slug": "horror"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let listed = json_body(server.get("/categories?q=hor", None).await).await;
    assert_eq!(listed["meta"]["total"], 1);

    let response = server.delete(&format!("/categories/{id}"), Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = server.get(&format!("/categories/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
