//! # Authentication Middleware
//!
//! Bearer access-token check for the protected routers.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::services::auth::{extract_bearer_token, AuthError, TokenType};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Validate the access token and put its [`Claims`](crate::services::Claims)
/// into the request extensions. Loading the user is left to the
/// [`CurrentUser`](crate::web::extractors::CurrentUser) extractor.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let claims = state.tokens.validate(token, TokenType::Access)?;

    debug!(user_id = %claims.sub, "Authenticated request");

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
