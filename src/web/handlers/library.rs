//! # Library Handlers
//!
//! The user's shelf of owned books.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::constants::library_source;
use crate::models::{Book, LibraryEntry, LibraryEntryDetail};
use crate::pagination::{PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

fn known_source(source: &str) -> Result<(), ValidationError> {
    if library_source::ALL.contains(&source) {
        Ok(())
    } else {
        let mut error = ValidationError::new("unknown_source");
        error.message = Some(format!("must be one of {}", library_source::ALL.join(", ")).into());
        Err(error)
    }
}

fn default_source() -> String {
    library_source::MANUAL.to_string()
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LibraryListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LibraryCreate {
    #[validate(length(min = 1))]
    pub book_id: String,
    #[serde(default = "default_source")]
    #[validate(custom(function = "known_source"))]
    pub source: String,
}

/// GET /library
pub async fn list_library(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(query): ValidatedQuery<LibraryListQuery>,
) -> ApiResult<Json<Paginated<LibraryEntryDetail>>> {
    let page = PageRequest::new(query.page, query.page_size);
    let (items, total) =
        LibraryEntry::list_for_user(&state.db_pool, &user.id, query.q.as_deref(), page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// POST /library
pub async fn add_to_library(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<LibraryCreate>,
) -> ApiResult<(StatusCode, Json<LibraryEntryDetail>)> {
    if Book::find_by_id(&state.db_pool, &request.book_id).await?.is_none() {
        return Err(ApiError::not_found("Book not found"));
    }
    if LibraryEntry::exists(&state.db_pool, &user.id, &request.book_id).await? {
        return Err(ApiError::conflict("Book already in library"));
    }

    let entry =
        LibraryEntry::create(&state.db_pool, &user.id, &request.book_id, &request.source).await?;
    info!(user_id = %user.id, book_id = %entry.book_id, source = %entry.source, "Added book to library");

    let detail = LibraryEntry::find_for_user(&state.db_pool, &user.id, &entry.id)
        .await?
        .ok_or(ApiError::Internal)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /library/:id
pub async fn get_library_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<LibraryEntryDetail>> {
    LibraryEntry::find_for_user(&state.db_pool, &user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Library item not found"))
}

/// DELETE /library/:id
pub async fn remove_from_library(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !LibraryEntry::delete_for_user(&state.db_pool, &user.id, &id).await? {
        return Err(ApiError::not_found("Library item not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
