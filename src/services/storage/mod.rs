//! # Object Storage
//!
//! Presigned upload and download URLs for book files and covers. Clients
//! never stream through the API for cloud backends: they receive a
//! time-limited URL and talk to the bucket directly. The local backend
//! serves the same contract from `/storage/local/*`, authenticated by an
//! HMAC signature in the query string.

mod local;
mod sigv4;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{non_empty, AppConfig, StorageBackendKind};

pub use local::LocalStorage;
pub use sigv4::{GcsStorage, S3Storage, SigningScheme, V4Signer};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage backend not configured: {0}")]
    NotConfigured(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("presigned URL has expired")]
    Expired,

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where and how the client should upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUpload {
    pub url: String,
    pub method: String,
    pub fields: BTreeMap<String, String>,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn presign_upload(&self, key: &str, expires_in: u64) -> Result<PresignedUpload, StorageError>;

    async fn presign_download(&self, key: &str, expires_in: u64) -> Result<String, StorageError>;

    /// The local backend also serves the signed URLs it hands out.
    fn as_local(&self) -> Option<&LocalStorage> {
        None
    }
}

/// Strip a leading `/` and reject keys that could escape the bucket root.
pub fn normalize_key(key: &str) -> Result<String, StorageError> {
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".to_string()));
    }
    if key.contains('\\') || key.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(
            "key contains forbidden characters".to_string(),
        ));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "key must not contain '..' segments".to_string(),
        ));
    }
    Ok(key.to_string())
}

/// Build the configured backend, falling back to local storage when the
/// selected cloud backend lacks credentials.
pub fn storage_from_config(config: &AppConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let kind = config
        .storage_backend_kind()
        .map_err(|e| StorageError::NotConfigured(e.to_string()))?;

    let local = || -> Arc<dyn StorageBackend> {
        Arc::new(LocalStorage::new(
            &config.storage_local_dir,
            &config.public_base_url,
            &config.secret_key,
        ))
    };

    let backend = match kind {
        StorageBackendKind::S3 => match (
            non_empty(&config.s3_bucket),
            non_empty(&config.s3_access_key_id),
            non_empty(&config.s3_secret_access_key),
        ) {
            (Some(bucket), Some(access_key), Some(secret_key)) => Arc::new(S3Storage::new(
                bucket,
                &config.s3_region,
                access_key,
                secret_key,
            )) as Arc<dyn StorageBackend>,
            _ => {
                warn!("STORAGE_BACKEND=s3 but S3 bucket or credentials are unset; using local storage");
                local()
            }
        },
        StorageBackendKind::Gcs => match (
            non_empty(&config.gcs_bucket),
            non_empty(&config.gcs_hmac_access_id),
            non_empty(&config.gcs_hmac_secret),
        ) {
            (Some(bucket), Some(access_id), Some(secret)) => {
                Arc::new(GcsStorage::new(bucket, access_id, secret)) as Arc<dyn StorageBackend>
            }
            _ => {
                warn!("STORAGE_BACKEND=gcs but GCS bucket or HMAC keys are unset; using local storage");
                local()
            }
        },
        StorageBackendKind::Local => local(),
    };

    Ok(backend)
}

/// Absolute expiry for a URL valid for `expires_in` seconds from now.
fn expiry_timestamp(expires_in: u64) -> i64 {
    Utc::now().timestamp() + i64::try_from(expires_in).unwrap_or(i64::MAX / 2)
}
