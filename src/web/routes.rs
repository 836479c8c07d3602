//! # Web API Route Definitions
//!
//! Routes are split by whether they need a bearer token. [`create_app`]
//! wraps [`protected_routes`] in the auth middleware and merges both sets;
//! paths shared between the two (such as `GET`/`POST /books`) combine
//! into one method router.
//!
//! [`create_app`]: crate::web::create_app

use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Routes reachable without a token: health, sign-in, catalog browsing,
/// the payment webhook and locally signed storage URLs.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        // Authentication
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/google", post(handlers::auth::google))
        // Catalog (read-only)
        .route("/books", get(handlers::books::list_books))
        .route("/books/:id", get(handlers::books::get_book))
        .route("/categories", get(handlers::categories::list_categories))
        .route("/categories/:id", get(handlers::categories::get_category))
        .route(
            "/categories/slug/:slug",
            get(handlers::categories::get_category_by_slug),
        )
        // Signature-authenticated
        .route("/payments/webhook", post(handlers::payments::payment_webhook))
        .route("/storage/local/upload", put(handlers::storage::local_upload))
        .route(
            "/storage/local/download",
            get(handlers::storage::local_download),
        )
}

/// Routes that require a valid access token.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(handlers::auth::me))
        // Catalog administration
        .route("/books", post(handlers::books::create_book))
        .route(
            "/books/:id",
            patch(handlers::books::update_book).delete(handlers::books::delete_book),
        )
        .route("/categories", post(handlers::categories::create_category))
        .route(
            "/categories/:id",
            patch(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // Per-user collections
        .route(
            "/wishlist",
            get(handlers::wishlist::list_wishlist).post(handlers::wishlist::add_to_wishlist),
        )
        .route(
            "/wishlist/:id",
            get(handlers::wishlist::get_wishlist_entry)
                .delete(handlers::wishlist::remove_from_wishlist),
        )
        .route(
            "/purchases",
            get(handlers::purchases::list_purchases).post(handlers::purchases::create_purchase),
        )
        .route("/purchases/:id", get(handlers::purchases::get_purchase))
        .route(
            "/library",
            get(handlers::library::list_library).post(handlers::library::add_to_library),
        )
        .route(
            "/library/:id",
            get(handlers::library::get_library_entry)
                .delete(handlers::library::remove_from_library),
        )
        .route("/reading", get(handlers::reading::list_progress))
        .route(
            "/reading/:book_id",
            get(handlers::reading::get_progress).put(handlers::reading::upsert_progress),
        )
        // Payments and storage
        .route("/payments/init", post(handlers::payments::init_payment))
        .route(
            "/storage/presign/upload",
            post(handlers::storage::presign_upload),
        )
        .route(
            "/storage/presign/download",
            post(handlers::storage::presign_download),
        )
        // Admin statistics
        .route(
            "/admin/stats/sales_by_day",
            get(handlers::admin::sales_by_day),
        )
        .route("/admin/stats/top_books", get(handlers::admin::top_books))
        .route("/admin/stats/summary", get(handlers::admin::summary))
}
