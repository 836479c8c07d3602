//! # Web API Application State
//!
//! Shared state handed to every handler: configuration, the database pool and
//! the service objects built from configuration at startup.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{BackendError, Result};
use crate::services::{
    provider_from_config, storage_from_config, GoogleIdTokenVerifier, IdTokenVerifier,
    PasswordHasher, PaymentProvider, StorageBackend, TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    pub db_pool: SqlitePool,

    /// Session token issuing and validation
    pub tokens: Arc<TokenService>,

    pub passwords: PasswordHasher,

    /// Verifies Google ID tokens for `/auth/google`
    pub id_token_verifier: Arc<dyn IdTokenVerifier>,

    pub payments: Arc<dyn PaymentProvider>,

    pub storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("payments", &self.payments.name())
            .field("storage", &self.storage.name())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build every service from configuration around an existing pool.
    pub fn new(config: AppConfig, db_pool: SqlitePool) -> Result<Self> {
        let tokens = TokenService::from_config(&config)
            .map_err(|e| BackendError::Provider(format!("token service: {e}")))?;
        let id_token_verifier = GoogleIdTokenVerifier::new(config.google_jwks_url.clone())
            .map_err(|e| BackendError::Provider(format!("Google verifier: {e}")))?;
        let payments = provider_from_config(&config)
            .map_err(|e| BackendError::Provider(format!("payment provider: {e}")))?;
        let storage = storage_from_config(&config)
            .map_err(|e| BackendError::Provider(format!("storage backend: {e}")))?;

        info!(
            payment_provider = payments.name(),
            storage_backend = storage.name(),
            "Application services initialized"
        );

        Ok(Self {
            passwords: PasswordHasher::new(config.bcrypt_cost),
            config: Arc::new(config),
            db_pool,
            tokens: Arc::new(tokens),
            id_token_verifier: Arc::new(id_token_verifier),
            payments,
            storage,
        })
    }

    /// Swap the Google ID token verifier.
    pub fn with_id_token_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.id_token_verifier = verifier;
        self
    }
}
