//! # Purchase Handlers
//!
//! Direct purchase recording. Every purchase also puts the book on the
//! buyer's shelf, in the same transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::constants::{library_source, purchase_status};
use crate::database::begin_write;
use crate::models::{Book, LibraryEntry, NewPurchase, Purchase, PurchaseDetail};
use crate::pagination::{PageParams, PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

fn known_status(status: &str) -> Result<(), ValidationError> {
    if purchase_status::ALL.contains(&status) {
        Ok(())
    } else {
        let mut error = ValidationError::new("unknown_status");
        error.message = Some(format!("must be one of {}", purchase_status::ALL.join(", ")).into());
        Err(error)
    }
}

fn default_status() -> String {
    purchase_status::COMPLETED.to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseCreate {
    #[validate(length(min = 1))]
    pub book_id: String,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(length(min = 3, max = 8))]
    pub currency: Option<String>,
    #[validate(length(max = 255))]
    pub transaction_id: Option<String>,
    #[serde(default = "default_status")]
    #[validate(custom(function = "known_status"))]
    pub status: String,
}

/// GET /purchases
pub async fn list_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<PageParams>,
) -> ApiResult<Json<Paginated<PurchaseDetail>>> {
    let page = PageRequest::from(params);
    let (items, total) = Purchase::list_for_user(&state.db_pool, &user.id, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// GET /purchases/:id
pub async fn get_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseDetail>> {
    Purchase::find_for_user(&state.db_pool, &user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Purchase not found"))
}

/// Record a purchase for the current user: POST /purchases
///
/// Price and currency default to the book's.
pub async fn create_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<PurchaseCreate>,
) -> ApiResult<(StatusCode, Json<PurchaseDetail>)> {
    let book = Book::find_by_id(&state.db_pool, &request.book_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    let mut tx = begin_write(&state.db_pool).await?;

    if Purchase::find_by_user_and_book(&mut *tx, &user.id, &book.id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Book already purchased"));
    }

    let purchase = Purchase::create(
        &mut *tx,
        NewPurchase {
            user_id: user.id.clone(),
            book_id: book.id.clone(),
            price_cents: request.price_cents.unwrap_or(book.price_cents),
            currency: request.currency.unwrap_or_else(|| book.currency.clone()),
            transaction_id: request.transaction_id,
            status: request.status,
        },
    )
    .await?;
    LibraryEntry::ensure(&mut *tx, &user.id, &book.id, library_source::PURCHASE).await?;

    tx.commit().await?;

    info!(
        purchase_id = %purchase.id,
        user_id = %user.id,
        book_id = %book.id,
        price_cents = purchase.price_cents,
        "Recorded purchase"
    );

    let detail = Purchase::find_for_user(&state.db_pool, &user.id, &purchase.id)
        .await?
        .ok_or(ApiError::Internal)?;
    Ok((StatusCode::CREATED, Json(detail)))
}
