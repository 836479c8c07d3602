//! Startup and infrastructure errors.
//!
//! Request-level failures are expressed as [`crate::web::errors::ApiError`];
//! this type covers everything that can stop the service from coming up.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("provider setup failed: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
