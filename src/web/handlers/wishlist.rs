//! # Wishlist Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::models::{Book, WishlistEntry, WishlistEntryDetail};
use crate::pagination::{PageParams, PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct WishlistCreate {
    #[validate(length(min = 1))]
    pub book_id: String,
}

/// GET /wishlist
pub async fn list_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<PageParams>,
) -> ApiResult<Json<Paginated<WishlistEntryDetail>>> {
    let page = PageRequest::from(params);
    let (items, total) = WishlistEntry::list_for_user(&state.db_pool, &user.id, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// POST /wishlist
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<WishlistCreate>,
) -> ApiResult<(StatusCode, Json<WishlistEntryDetail>)> {
    if Book::find_by_id(&state.db_pool, &request.book_id).await?.is_none() {
        return Err(ApiError::not_found("Book not found"));
    }
    if WishlistEntry::exists(&state.db_pool, &user.id, &request.book_id).await? {
        return Err(ApiError::conflict("Book already in wishlist"));
    }

    let entry = WishlistEntry::create(&state.db_pool, &user.id, &request.book_id).await?;
    info!(user_id = %user.id, book_id = %entry.book_id, "Added book to wishlist");

    let detail = WishlistEntry::find_for_user(&state.db_pool, &user.id, &entry.id)
        .await?
        .ok_or(ApiError::Internal)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /wishlist/:id
pub async fn get_wishlist_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<WishlistEntryDetail>> {
    WishlistEntry::find_for_user(&state.db_pool, &user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Wishlist item not found"))
}

/// DELETE /wishlist/:id
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !WishlistEntry::delete_for_user(&state.db_pool, &user.id, &id).await? {
        return Err(ApiError::not_found("Wishlist item not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
