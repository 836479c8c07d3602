//! # Configuration
//!
//! Application settings are read from the process environment (after an optional
//! `.env` file is loaded) through the `config` crate. Every field carries a
//! default, so a fresh checkout serves from a local SQLite file with the mock
//! payment provider and local storage.

use std::fmt;
use std::str::FromStr;

use config::{Config, Environment};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_SECRET_KEY, GOOGLE_JWKS_URL, REDACTED};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Which payment integration backs `/payments`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProviderKind {
    Mock,
    Stripe,
    Razorpay,
}

impl FromStr for PaymentProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "mock" => Ok(Self::Mock),
            "stripe" => Ok(Self::Stripe),
            "razorpay" => Ok(Self::Razorpay),
            other => Err(ConfigError::invalid(format!(
                "unknown payment provider '{other}'"
            ))),
        }
    }
}

impl fmt::Display for PaymentProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Stripe => write!(f, "stripe"),
            Self::Razorpay => write!(f, "razorpay"),
        }
    }
}

/// Which object store presigned URLs point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Local,
    S3,
    Gcs,
}

impl FromStr for StorageBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            "gcs" => Ok(Self::Gcs),
            other => Err(ConfigError::invalid(format!(
                "unknown storage backend '{other}'"
            ))),
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::S3 => write!(f, "s3"),
            Self::Gcs => write!(f, "gcs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub project_name: String,
    pub project_description: String,
    pub environment: String,
    pub app_version: String,
    pub bind_address: String,
    pub log_format: String,

    // Security
    pub secret_key: String,
    pub jwt_algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    pub bcrypt_cost: u32,
    pub cors_origins: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // HTTP
    pub request_timeout_seconds: u64,
    pub max_upload_bytes: usize,

    // Google sign-in
    pub google_client_id: Option<String>,
    pub oauth_google_client_id: Option<String>,
    pub google_jwks_url: String,

    // Payments
    pub payment_provider: String,
    pub default_currency: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_success_url: String,
    pub stripe_cancel_url: String,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub razorpay_webhook_secret: Option<String>,

    // Storage
    pub storage_backend: String,
    pub storage_local_dir: String,
    pub public_base_url: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub gcs_bucket: Option<String>,
    pub gcs_hmac_access_id: Option<String>,
    pub gcs_hmac_secret: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_name: "KindlePlus Backend API".to_string(),
            project_description: "Backend API for the KindlePlus e-book store".to_string(),
            environment: "development".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            bind_address: "0.0.0.0:8000".to_string(),
            log_format: "pretty".to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            jwt_algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_minutes: 60 * 24 * 30,
            bcrypt_cost: 12,
            cors_origins: "*".to_string(),
            database_url: "sqlite://data/app.db".to_string(),
            database_max_connections: 10,
            request_timeout_seconds: 30,
            max_upload_bytes: 50 * 1024 * 1024,
            google_client_id: None,
            oauth_google_client_id: None,
            google_jwks_url: GOOGLE_JWKS_URL.to_string(),
            payment_provider: "mock".to_string(),
            default_currency: "USD".to_string(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_success_url: "http://localhost:3000/checkout/success".to_string(),
            stripe_cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_webhook_secret: None,
            storage_backend: "local".to_string(),
            storage_local_dir: "./storage".to_string(),
            public_base_url: String::new(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            gcs_bucket: None,
            gcs_hmac_access_id: None,
            gcs_hmac_secret: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        Self::from_environment(Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process
    /// environment. Keys use the same upper-case names as the real variables.
    pub fn from_env_map<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self::from_environment(Environment::default().source(Some(source)))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt_algorithm()?;
        self.payment_provider_kind()?;
        self.storage_backend_kind()?;

        if self.access_token_expire_minutes <= 0 || self.refresh_token_expire_minutes <= 0 {
            return Err(ConfigError::invalid("token lifetimes must be positive"));
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::invalid("bcrypt_cost must be between 4 and 31"));
        }

        if self.database_max_connections == 0 {
            return Err(ConfigError::invalid(
                "database_max_connections must be at least 1",
            ));
        }

        if self.is_production() && self.secret_key == DEFAULT_SECRET_KEY {
            return Err(ConfigError::invalid(
                "SECRET_KEY must be changed in production",
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn jwt_algorithm(&self) -> Result<Algorithm, ConfigError> {
        match self.jwt_algorithm.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(ConfigError::invalid(format!(
                "unsupported JWT algorithm '{other}'"
            ))),
        }
    }

    pub fn payment_provider_kind(&self) -> Result<PaymentProviderKind, ConfigError> {
        self.payment_provider.parse()
    }

    pub fn storage_backend_kind(&self) -> Result<StorageBackendKind, ConfigError> {
        self.storage_backend.parse()
    }

    /// Allowed CORS origins. `["*"]` means any origin.
    pub fn cors_origin_list(&self) -> Vec<String> {
        let raw = self.cors_origins.trim();
        if raw.is_empty() || raw == "*" {
            return vec!["*".to_string()];
        }

        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Google OAuth client id, accepting either variable name.
    pub fn google_client_id(&self) -> Option<&str> {
        non_empty(&self.google_client_id).or_else(|| non_empty(&self.oauth_google_client_id))
    }

    /// Copy of the configuration with secrets masked, safe to log or print.
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| value.as_ref().map(|_| REDACTED.to_string());

        Self {
            secret_key: REDACTED.to_string(),
            database_url: redact_url_password(&self.database_url),
            stripe_secret_key: mask(&self.stripe_secret_key),
            stripe_webhook_secret: mask(&self.stripe_webhook_secret),
            razorpay_key_secret: mask(&self.razorpay_key_secret),
            razorpay_webhook_secret: mask(&self.razorpay_webhook_secret),
            s3_secret_access_key: mask(&self.s3_secret_access_key),
            gcs_hmac_secret: mask(&self.gcs_hmac_secret),
            ..self.clone()
        }
    }
}

/// Treats blank optional settings as unset.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn redact_url_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:{REDACTED}@{host}"),
        None => url.to_string(),
    }
}
