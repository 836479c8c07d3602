//! # Authentication Handlers
//!
//! Registration, password login, token refresh and Google sign-in. Every
//! successful call answers with a fresh token pair and the user's profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::models::{NewUser, User};
use crate::services::{get_or_create_user_from_google, TokenPair, TokenType};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, ValidatedJson};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 255))]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GoogleLoginRequest {
    #[validate(length(min = 1))]
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub tokens: TokenPair,
    pub user: User,
}

fn respond(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let tokens = state.tokens.issue_pair(&user)?;
    Ok(AuthResponse { tokens, user })
}

/// Create a password account: POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if User::find_by_email(&state.db_pool, &request.email).await?.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let hashed_password = state.passwords.hash(&request.password).await?;
    let user = User::create(
        &state.db_pool,
        NewUser {
            email: request.email,
            hashed_password,
            full_name: request.full_name,
            ..NewUser::default()
        },
    )
    .await?;

    info!(user_id = %user.id, "Registered user");

    Ok((StatusCode::CREATED, Json(respond(&state, user)?)))
}

/// Password login: POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || {
        warn!("Rejected login with invalid credentials");
        ApiError::auth_error("Invalid credentials")
    };

    // Unknown email and wrong password answer identically
    let user = User::find_by_email(&state.db_pool, &request.email)
        .await?
        .ok_or_else(invalid)?;
    if !state
        .passwords
        .verify(&request.password, &user.hashed_password)
        .await
    {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::auth_error("User is inactive"));
    }

    info!(user_id = %user.id, "User logged in");

    Ok(Json(respond(&state, user)?))
}

/// Exchange a refresh token for a new pair: POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let claims = state
        .tokens
        .validate(&request.refresh_token, TokenType::Refresh)?;

    let user = User::find_by_id(&state.db_pool, &claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::auth_error("Inactive or missing user"))?;

    Ok(Json(respond(&state, user)?))
}

/// Sign in with a Google ID token: POST /auth/google
pub async fn google(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<GoogleLoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let client_id = state.config.google_client_id().ok_or_else(|| {
        ApiError::configuration("Google OAuth not configured. Set GOOGLE_CLIENT_ID.")
    })?;

    let claims = state
        .id_token_verifier
        .verify(&request.id_token, client_id)
        .await?;
    let user = get_or_create_user_from_google(&state.db_pool, &state.passwords, &claims).await?;

    if !user.is_active {
        return Err(ApiError::auth_error("User is inactive"));
    }

    info!(user_id = %user.id, "User signed in with Google");

    Ok(Json(respond(&state, user)?))
}

/// Profile of the authenticated user: GET /auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
