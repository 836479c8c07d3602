//! # Storage Handlers
//!
//! Presigned URL issuance for authenticated users, plus the two endpoints
//! that serve signed URLs when the local backend is active.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::constants::presign::DEFAULT_EXPIRES_IN;
use crate::services::{normalize_key, LocalStorage, PresignedUpload};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

#[derive(Debug, Deserialize, Validate)]
pub struct PresignRequest {
    #[validate(length(min = 1, max = 1024))]
    pub key: String,
    #[serde(default = "default_expires_in")]
    #[validate(range(min = 1, max = 3600))]
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct PresignedDownload {
    pub url: String,
}

/// Query parameters carried by a locally signed URL.
#[derive(Debug, Deserialize, Validate)]
pub struct SignedParams {
    pub key: String,
    pub exp: i64,
    pub sig: String,
}

#[derive(Debug, Serialize)]
pub struct UploadAck {
    pub status: &'static str,
    pub key: String,
}

/// POST /storage/presign/upload
pub async fn presign_upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<PresignRequest>,
) -> ApiResult<Json<PresignedUpload>> {
    let key = normalize_key(&request.key)?;
    let upload = state.storage.presign_upload(&key, request.expires_in).await?;
    info!(user_id = %user.id, key = %key, backend = state.storage.name(), "Presigned upload");
    Ok(Json(upload))
}

/// POST /storage/presign/download
pub async fn presign_download(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<PresignRequest>,
) -> ApiResult<Json<PresignedDownload>> {
    let key = normalize_key(&request.key)?;
    let url = state.storage.presign_download(&key, request.expires_in).await?;
    info!(user_id = %user.id, key = %key, backend = state.storage.name(), "Presigned download");
    Ok(Json(PresignedDownload { url }))
}

fn local_backend(state: &AppState) -> ApiResult<&LocalStorage> {
    state
        .storage
        .as_local()
        .ok_or_else(|| ApiError::not_found("Local storage is not enabled"))
}

/// Receive an upload against a signed URL: PUT /storage/local/upload
pub async fn local_upload(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<SignedParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadAck>)> {
    let storage = local_backend(&state)?;
    let key = storage.verify("PUT", &params.key, params.exp, &params.sig)?;
    storage.write(&key, &body).await?;

    info!(key = %key, size = body.len(), "Stored upload");

    Ok((StatusCode::CREATED, Json(UploadAck { status: "ok", key })))
}

/// Serve an object against a signed URL: GET /storage/local/download
pub async fn local_download(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<SignedParams>,
) -> ApiResult<Response> {
    let storage = local_backend(&state)?;
    let key = storage.verify("GET", &params.key, params.exp, &params.sig)?;
    let bytes = storage.read(&key).await?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}
