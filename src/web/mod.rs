//! # Web API Module
//!
//! Axum-based REST API for the KindlePlus store.
//!
//! ## Core Components
//!
//! - [`routes`] - HTTP route definitions, split into public and protected sets
//! - [`handlers`] - Request handlers, one module per resource
//! - [`middleware`] - Request ids, bearer authentication, outer tower layers
//! - [`extractors`] - Authenticated-user and validating extractors
//! - [`errors`] - API error type and its JSON response shape
//! - [`state`] - Shared application state

pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

pub use errors::{ApiError, ApiResult};

/// Create the main Axum application with all routes and middleware.
pub fn create_app(app_state: AppState) -> Router {
    let protected_routes = routes::protected_routes().layer(axum::middleware::from_fn_with_state(
        app_state.clone(),
        middleware::auth::require_auth,
    ));

    let router = Router::new()
        .merge(routes::public_routes())
        .merge(protected_routes);

    middleware::apply_middleware_stack(router, &app_state.config).with_state(app_state)
}
