//! # Health Check Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use crate::database::ping;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    status: &'static str,
    environment: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

/// Service banner: GET /
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        environment: state.config.environment.clone(),
        version: state.config.app_version.clone(),
    })
}

/// Database-backed health check: GET /health
///
/// 200 when the database answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    debug!("Performing health check");

    let (status_code, status, database) = match ping(&state.db_pool).await {
        Ok(true) => (StatusCode::OK, "healthy", "ok"),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unexpected response"),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unreachable")
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            database,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
        .into_response()
}
