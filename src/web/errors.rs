//! # Web API Error Types
//!
//! Request-level errors and their HTTP mapping. Every error body has the shape
//! `{"error": {"code": ..., "message": ...}}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::{AuthError, OAuthError, PaymentError, StorageError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Authentication failed: {reason}")]
    AuthenticationError { reason: String },

    #[error("Authorization failed: {reason}")]
    AuthorizationError { reason: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Upstream provider failed: {message}")]
    Upstream { message: String },

    #[error("Server misconfigured: {message}")]
    Configuration { message: String },

    #[error("Database operation failed: {operation}")]
    DatabaseError { operation: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn auth_error(reason: impl Into<String>) -> Self {
        Self::AuthenticationError {
            reason: reason.into(),
        }
    }

    pub fn authorization_error(reason: impl Into<String>) -> Self {
        Self::AuthorizationError {
            reason: reason.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn database_error(operation: impl Into<String>) -> Self {
        Self::DatabaseError {
            operation: operation.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized | Self::AuthenticationError { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthorizationError { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. } | Self::DatabaseError { .. } | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::AuthenticationError { .. } => "AUTHENTICATION_FAILED",
            Self::AuthorizationError { .. } => "AUTHORIZATION_FAILED",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Conflict { message }
            | Self::BadRequest { message }
            | Self::Validation { message }
            | Self::Upstream { message }
            | Self::Configuration { message } => message.clone(),
            Self::AuthenticationError { reason } | Self::AuthorizationError { reason } => {
                reason.clone()
            }
            Self::DatabaseError { operation } => operation.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!(status = %status_code, error = %self, "Request failed");
        }

        let error_response = json!({
            "error": {
                "code": self.code(),
                "message": self.message()
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::conflict("Resource already exists")
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::bad_request("Referenced resource does not exist")
            }
            sqlx::Error::PoolTimedOut => ApiError::ServiceUnavailable,
            _ => {
                error!(error = %err, "Database error");
                ApiError::database_error("Database operation failed")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwtError(e) => {
                warn!(error = %e, "JWT validation failed");
                ApiError::auth_error("Invalid or expired token")
            }
            AuthError::InvalidToken(reason) => ApiError::auth_error(reason),
            AuthError::MissingAuthHeader | AuthError::InvalidAuthFormat => {
                ApiError::auth_error(err.to_string())
            }
            AuthError::ConfigurationError(message) => ApiError::configuration(message),
            AuthError::HashingError(message) => {
                error!(error = %message, "Password hashing failed");
                ApiError::Internal
            }
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::NotConfigured => ApiError::configuration(err.to_string()),
            OAuthError::InvalidToken(_) | OAuthError::UnverifiedEmail | OAuthError::MissingEmail => {
                ApiError::bad_request(err.to_string())
            }
            OAuthError::KeyFetch(_) => ApiError::upstream(err.to_string()),
            OAuthError::Database(e) => e.into(),
            OAuthError::Hashing(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured(_) => ApiError::configuration(err.to_string()),
            PaymentError::InvalidSignature(_) | PaymentError::InvalidPayload(_) => {
                warn!(error = %err, "Rejected payment webhook");
                ApiError::bad_request(err.to_string())
            }
            PaymentError::Upstream(_) => ApiError::upstream(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) => ApiError::bad_request(err.to_string()),
            StorageError::NotConfigured(_) => ApiError::configuration(err.to_string()),
            StorageError::InvalidSignature | StorageError::Expired => {
                ApiError::authorization_error(err.to_string())
            }
            StorageError::NotFound(_) => ApiError::not_found(err.to_string()),
            StorageError::Io(e) => {
                error!(error = %e, "Storage I/O failed");
                ApiError::Internal
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: invalid value ({})", e.code),
                })
            })
            .collect();
        messages.sort();
        ApiError::validation(messages.join("; "))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
