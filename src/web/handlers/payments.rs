//! # Payment Handlers
//!
//! Checkout initiation and the provider webhook. The webhook is the only
//! path that records provider-confirmed purchases; it is idempotent on the
//! provider's transaction id.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::constants::{library_source, purchase_status};
use crate::database::begin_write;
use crate::models::{Book, LibraryEntry, NewPurchase, Purchase, User};
use crate::services::{CheckoutRequest, CheckoutSession, WebhookEvent};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, RequestContext, ValidatedJson};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentInitRequest {
    #[validate(length(min = 1))]
    pub book_id: String,
    #[validate(length(min = 3, max = 8))]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
}

impl WebhookAck {
    fn ignored() -> Self {
        Self {
            status: "ignored",
            purchase_id: None,
        }
    }

    fn ok(purchase_id: Option<String>) -> Self {
        Self {
            status: "ok",
            purchase_id,
        }
    }
}

/// Start a checkout for a book: POST /payments/init
pub async fn init_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(request): ValidatedJson<PaymentInitRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let book = Book::find_by_id(&state.db_pool, &request.book_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    let checkout = CheckoutRequest {
        user_id: user.id.clone(),
        book_id: book.id.clone(),
        book_title: book.title.clone(),
        amount_cents: book.price_cents,
        currency: request.currency.unwrap_or(book.currency),
    };

    let session = state.payments.create_session(&checkout).await?;
    info!(
        provider = %session.provider,
        user_id = %user.id,
        book_id = %book.id,
        amount_cents = checkout.amount_cents,
        "Created checkout session"
    );

    Ok(Json(session))
}

/// Provider webhook: POST /payments/webhook
///
/// Unauthenticated; the provider's signature is the credential.
pub async fn payment_webhook(
    State(state): State<AppState>,
    context: RequestContext,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let event = state.payments.verify_webhook(&body, &headers)?;

    debug!(
        request_id = %context.request_id,
        provider = state.payments.name(),
        kind = %event.kind,
        succeeded = event.succeeded,
        "Received payment webhook"
    );

    let ack = record_event(&state, &event).await?;
    if let Some(purchase_id) = &ack.purchase_id {
        info!(
            request_id = %context.request_id,
            purchase_id = %purchase_id,
            transaction_id = ?event.transaction_id,
            "Payment webhook processed"
        );
    }

    Ok(Json(ack))
}

/// Apply a verified event. Replays of a known transaction return the
/// purchase already recorded for it.
async fn record_event(state: &AppState, event: &WebhookEvent) -> ApiResult<WebhookAck> {
    let Some(transaction_id) = event.transaction_id.as_deref() else {
        return Ok(WebhookAck::ignored());
    };

    // Resolve buyer and book before taking the write lock
    let target = match (event.succeeded, event.user_id.as_deref(), event.book_id.as_deref()) {
        (true, Some(user_id), Some(book_id)) => {
            let user = User::find_by_id(&state.db_pool, user_id).await?;
            let book = Book::find_by_id(&state.db_pool, book_id).await?;
            match (user, book) {
                (Some(user), Some(book)) => Some((user, book)),
                _ => {
                    warn!(user_id, book_id, "Payment webhook references unknown user or book");
                    None
                }
            }
        }
        _ => None,
    };

    let mut tx = begin_write(&state.db_pool).await?;

    if let Some(existing) = Purchase::find_by_transaction_id(&mut *tx, transaction_id).await? {
        return Ok(WebhookAck::ok(Some(existing.id)));
    }

    let Some((user, book)) = target else {
        return Ok(WebhookAck::ok(None));
    };

    if let Some(existing) = Purchase::find_by_user_and_book(&mut *tx, &user.id, &book.id).await? {
        return Ok(WebhookAck::ok(Some(existing.id)));
    }

    let purchase = Purchase::create(
        &mut *tx,
        NewPurchase {
            user_id: user.id.clone(),
            book_id: book.id.clone(),
            price_cents: event.amount_cents.unwrap_or(book.price_cents),
            currency: event.currency.clone().unwrap_or(book.currency),
            transaction_id: Some(transaction_id.to_string()),
            status: purchase_status::COMPLETED.to_string(),
        },
    )
    .await?;
    LibraryEntry::ensure(&mut *tx, &user.id, &book.id, library_source::PURCHASE).await?;

    tx.commit().await?;

    Ok(WebhookAck::ok(Some(purchase.id)))
}
