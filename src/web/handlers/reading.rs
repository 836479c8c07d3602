//! # Reading Progress Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use super::nullable;
use crate::models::{Book, ProgressUpdate, ReadingProgress, ReadingProgressDetail};
use crate::pagination::{PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReadingListQuery {
    pub is_completed: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProgressRequest {
    #[validate(range(min = 0.0, max = 100.0))]
    pub progress_percent: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 255))]
    pub current_chapter: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 255))]
    pub current_location: Option<Option<String>>,
    pub is_completed: Option<bool>,
}

impl From<ProgressRequest> for ProgressUpdate {
    fn from(request: ProgressRequest) -> Self {
        Self {
            progress_percent: request.progress_percent,
            current_chapter: request.current_chapter,
            current_location: request.current_location,
            is_completed: request.is_completed,
        }
    }
}

/// GET /reading
pub async fn list_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(query): ValidatedQuery<ReadingListQuery>,
) -> ApiResult<Json<Paginated<ReadingProgressDetail>>> {
    let page = PageRequest::new(query.page, query.page_size);
    let (items, total) =
        ReadingProgress::list_for_user(&state.db_pool, &user.id, query.is_completed, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// GET /reading/:book_id
pub async fn get_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<String>,
) -> ApiResult<Json<ReadingProgressDetail>> {
    ReadingProgress::find_for_user_book(&state.db_pool, &user.id, &book_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Reading progress not found"))
}

/// Create or update progress for a book: PUT /reading/:book_id
///
/// 201 when the record is new, 200 otherwise.
pub async fn upsert_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<String>,
    ValidatedJson(request): ValidatedJson<ProgressRequest>,
) -> ApiResult<(StatusCode, Json<ReadingProgressDetail>)> {
    if Book::find_by_id(&state.db_pool, &book_id).await?.is_none() {
        return Err(ApiError::not_found("Book not found"));
    }

    let (progress, created) =
        ReadingProgress::upsert(&state.db_pool, &user.id, &book_id, request.into()).await?;
    debug!(
        user_id = %user.id,
        book_id = %book_id,
        percent = progress.record.progress_percent,
        created,
        "Saved reading progress"
    );

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(progress)))
}
