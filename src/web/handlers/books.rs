//! # Catalog Handlers
//!
//! Public browsing of books plus admin-only create, update and delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use validator::Validate;

use super::nullable;
use crate::database::begin_write;
use crate::models::{Book, BookChanges, BookFilter, Category, CategorySummary, NewBook};
use crate::pagination::{PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{AdminUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

/// A book with the categories it is filed under.
#[derive(Debug, Clone, Serialize)]
pub struct BookRead {
    #[serde(flatten)]
    pub book: Book,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BookListQuery {
    pub q: Option<String>,
    pub author: Option<String>,
    pub category_id: Option<String>,
    pub category_slug: Option<String>,
    #[validate(range(min = 0))]
    pub price_min: Option<i64>,
    #[validate(range(min = 0))]
    pub price_max: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    pub description: Option<String>,
    #[validate(length(max = 512))]
    pub cover_image_url: Option<String>,
    #[validate(length(max = 512))]
    pub file_url: Option<String>,
    #[validate(length(max = 512))]
    pub sample_file_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub price_cents: i64,
    /// Defaults to the configured store currency.
    #[validate(length(min = 3, max = 8))]
    pub currency: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(length(max = 32))]
    pub isbn: Option<String>,
    #[validate(length(max = 32))]
    pub language: Option<String>,
    #[validate(range(min = 1))]
    pub page_count: Option<i64>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,
    pub category_ids: Option<Vec<String>>,
}

/// Partial update. Nullable fields accept `null` to clear them.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct BookUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 512))]
    pub cover_image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 512))]
    pub file_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 512))]
    pub sample_file_url: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(length(min = 3, max = 8))]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub published_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 32))]
    pub isbn: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 32))]
    pub language: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(range(min = 1))]
    pub page_count: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<Option<f64>>,
    pub category_ids: Option<Vec<String>>,
}

impl BookUpdate {
    fn into_parts(self) -> (BookChanges, Option<Vec<String>>) {
        let changes = BookChanges {
            title: self.title,
            author: self.author,
            description: self.description,
            cover_image_url: self.cover_image_url,
            file_url: self.file_url,
            sample_file_url: self.sample_file_url,
            price_cents: self.price_cents,
            currency: self.currency,
            published_date: self.published_date,
            isbn: self.isbn,
            language: self.language,
            page_count: self.page_count,
            rating: self.rating,
        };
        (changes, self.category_ids)
    }
}

/// Attach category summaries to each book, preserving order.
async fn with_categories(pool: &SqlitePool, books: Vec<Book>) -> ApiResult<Vec<BookRead>> {
    let ids: Vec<String> = books.iter().map(|book| book.id.clone()).collect();
    let mut categories = Category::find_for_books(pool, &ids).await?;

    Ok(books
        .into_iter()
        .map(|book| BookRead {
            categories: categories.remove(&book.id).unwrap_or_default(),
            book,
        })
        .collect())
}

async fn read_book(pool: &SqlitePool, id: &str) -> ApiResult<BookRead> {
    let book = Book::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;
    let mut books = with_categories(pool, vec![book]).await?;
    books.pop().ok_or(ApiError::Internal)
}

/// Deduplicate and check that every id names a category.
async fn checked_category_ids(pool: &SqlitePool, mut ids: Vec<String>) -> ApiResult<Vec<String>> {
    ids.sort();
    ids.dedup();

    let missing = Category::missing_ids(pool, &ids).await?;
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Unknown category ids: {}",
            missing.join(", ")
        )));
    }
    Ok(ids)
}

/// Search the catalog: GET /books
pub async fn list_books(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<BookListQuery>,
) -> ApiResult<Json<Paginated<BookRead>>> {
    let page = PageRequest::new(query.page, query.page_size);
    let filter = BookFilter {
        q: query.q,
        author: query.author,
        category_id: query.category_id,
        category_slug: query.category_slug,
        price_min: query.price_min,
        price_max: query.price_max,
    };
    debug!(?filter, page = page.page, "Listing books");

    let (books, total) = Book::list(&state.db_pool, &filter, page).await?;
    let items = with_categories(&state.db_pool, books).await?;

    Ok(Json(Paginated::new(items, total, page)))
}

/// GET /books/:id
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookRead>> {
    Ok(Json(read_book(&state.db_pool, &id).await?))
}

/// Add a book to the catalog: POST /books
pub async fn create_book(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(request): ValidatedJson<BookCreate>,
) -> ApiResult<(StatusCode, Json<BookRead>)> {
    let category_ids = match request.category_ids {
        Some(ids) => checked_category_ids(&state.db_pool, ids).await?,
        None => Vec::new(),
    };

    let new_book = NewBook {
        title: request.title,
        author: request.author,
        description: request.description,
        cover_image_url: request.cover_image_url,
        file_url: request.file_url,
        sample_file_url: request.sample_file_url,
        price_cents: request.price_cents,
        currency: request
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        published_date: request.published_date,
        isbn: request.isbn,
        language: request.language,
        page_count: request.page_count,
        rating: request.rating,
    };

    let mut tx = begin_write(&state.db_pool).await?;
    let book = Book::create(&mut *tx, new_book).await?;
    Book::set_categories(&mut *tx, &book.id, &category_ids).await?;
    tx.commit().await?;

    info!(book_id = %book.id, admin_id = %admin.id, "Created book");

    Ok((StatusCode::CREATED, Json(read_book(&state.db_pool, &book.id).await?)))
}

/// Partially update a book: PATCH /books/:id
///
/// `category_ids`, when present, replaces the book's category set.
pub async fn update_book(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<BookUpdate>,
) -> ApiResult<Json<BookRead>> {
    let mut book = Book::find_by_id(&state.db_pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    let (changes, category_ids) = request.into_parts();
    let category_ids = match category_ids {
        Some(ids) => Some(checked_category_ids(&state.db_pool, ids).await?),
        None => None,
    };
    changes.apply(&mut book);

    let mut tx = begin_write(&state.db_pool).await?;
    Book::save(&mut *tx, &book).await?;
    if let Some(category_ids) = &category_ids {
        Book::set_categories(&mut *tx, &book.id, category_ids).await?;
    }
    tx.commit().await?;

    info!(book_id = %book.id, admin_id = %admin.id, "Updated book");

    Ok(Json(read_book(&state.db_pool, &book.id).await?))
}

/// Remove a book and everything that references it: DELETE /books/:id
pub async fn delete_book(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !Book::delete(&state.db_pool, &id).await? {
        return Err(ApiError::not_found("Book not found"));
    }

    info!(book_id = %id, admin_id = %admin.id, "Deleted book");

    Ok(StatusCode::NO_CONTENT)
}
