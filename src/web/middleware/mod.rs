//! # Web API Middleware
//!
//! Request ids, bearer authentication and the outer tower layers shared by
//! every route.

pub mod auth;
pub mod request_id;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::AppConfig;

/// Apply the outer middleware stack, outermost first:
/// 1. Request ID generation
/// 2. Tracing and logging
/// 3. CORS handling
/// 4. Request timeout
/// 5. Body size limit
///
/// Preflight answers and timeouts produced by inner layers still carry
/// `X-Request-ID`.
pub fn apply_middleware_stack<S>(router: Router<S>, config: &AppConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_seconds,
        )))
        .layer(create_cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::add_request_id))
}

/// `*` allows any origin without credentials. An explicit list allows those
/// origins with credentials, mirroring the requested methods and headers.
pub fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.cors_origin_list();
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn config_with_origins(origins: &str) -> AppConfig {
        AppConfig {
            cors_origins: origins.to_string(),
            ..AppConfig::default()
        }
    }

    async fn preflight(config: &AppConfig, origin: &str) -> axum::http::Response<Body> {
        let app: Router = Router::new()
            .route("/books", get(|| async { "ok" }))
            .layer(create_cors_layer(config));

        app.oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/books")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_wildcard_cors_allows_any_origin_without_credentials() {
        let response = preflight(&config_with_origins("*"), "https://reader.example").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_stack_tags_preflight_and_timeout_responses() {
        let config = AppConfig {
            cors_origins: "https://app.example".to_string(),
            request_timeout_seconds: 1,
            ..AppConfig::default()
        };
        let app: Router = apply_middleware_stack(
            Router::new()
                .route("/books", get(|| async { "ok" }))
                .route(
                    "/slow",
                    get(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        "late"
                    }),
                ),
            &config,
        );

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/books")
                    .header(header::ORIGIN, "https://app.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(request_id::REQUEST_ID_HEADER, "preflight-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[request_id::REQUEST_ID_HEADER], "preflight-1");

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key(request_id::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_explicit_cors_list_allows_credentials() {
        let config = config_with_origins("https://app.example, https://admin.example");

        let response = preflight(&config, "https://admin.example").await;
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://admin.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");

        let response = preflight(&config, "https://evil.example").await;
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
