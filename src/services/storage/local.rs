use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{expiry_timestamp, normalize_key, PresignedUpload, StorageBackend, StorageError};
use crate::services::signing::{hmac_sha256_hex, verify_hmac_sha256_hex};

/// Files under a local directory, reachable through HMAC-signed URLs served
/// by the API itself.
pub struct LocalStorage {
    base_dir: PathBuf,
    public_base_url: String,
    secret: String,
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("base_dir", &self.base_dir)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>, public_base_url: &str, secret: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn signature(&self, method: &str, key: &str, exp: i64) -> String {
        hmac_sha256_hex(&self.secret, signed_message(method, key, exp))
    }

    fn signed_url(&self, action: &str, method: &str, key: &str, exp: i64) -> String {
        format!(
            "{}/storage/local/{action}?key={}&exp={exp}&sig={}",
            self.public_base_url,
            urlencoding::encode(key),
            self.signature(method, key, exp)
        )
    }

    /// Check a signed request for `method` on `key`. Returns the normalised key.
    pub fn verify(&self, method: &str, key: &str, exp: i64, sig: &str) -> Result<String, StorageError> {
        let key = normalize_key(key)?;
        if !verify_hmac_sha256_hex(&self.secret, signed_message(method, &key, exp), sig) {
            return Err(StorageError::InvalidSignature);
        }
        if Utc::now().timestamp() > exp {
            return Err(StorageError::Expired);
        }
        Ok(key)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.base_dir.join(normalize_key(key)?))
    }

    pub async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(key = %key, size = bytes.len(), "Stored local object");
        Ok(())
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn signed_message(method: &str, key: &str, exp: i64) -> String {
    format!("{method}\n{key}\n{exp}")
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn presign_upload(&self, key: &str, expires_in: u64) -> Result<PresignedUpload, StorageError> {
        let key = normalize_key(key)?;
        let exp = expiry_timestamp(expires_in);
        Ok(PresignedUpload {
            url: self.signed_url("upload", "PUT", &key, exp),
            method: "PUT".to_string(),
            fields: BTreeMap::new(),
        })
    }

    async fn presign_download(&self, key: &str, expires_in: u64) -> Result<String, StorageError> {
        let key = normalize_key(key)?;
        let exp = expiry_timestamp(expires_in);
        Ok(self.signed_url("download", "GET", &key, exp))
    }

    fn as_local(&self) -> Option<&LocalStorage> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split_once('?')
            .unwrap()
            .1
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:8000/", "local-secret")
    }

    #[tokio::test]
    async fn test_presigned_urls_verify() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let upload = storage.presign_upload("/books/my book.epub", 60).await.unwrap();
        assert_eq!(upload.method, "PUT");
        assert!(upload
            .url
            .starts_with("http://localhost:8000/storage/local/upload?key=books%2Fmy%20book.epub&"));

        let exp: i64 = query_param(&upload.url, "exp").parse().unwrap();
        let sig = query_param(&upload.url, "sig");
        assert_eq!(
            storage.verify("PUT", "books/my book.epub", exp, sig).unwrap(),
            "books/my book.epub"
        );

        // An upload signature does not authorise a download
        assert!(matches!(
            storage.verify("GET", "books/my book.epub", exp, sig),
            Err(StorageError::InvalidSignature)
        ));
        assert!(matches!(
            storage.verify("PUT", "books/other.epub", exp, sig),
            Err(StorageError::InvalidSignature)
        ));
    }

    #[test]
    fn test_malformed_signatures_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let exp = Utc::now().timestamp() + 60;
        let sig = storage.signature("GET", "a.txt", exp);

        assert!(storage.verify("GET", "a.txt", exp, &sig.to_uppercase()).is_ok());
        for bad in [&sig[..sig.len() - 2], "zz", ""] {
            assert!(matches!(
                storage.verify("GET", "a.txt", exp, bad),
                Err(StorageError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn test_expired_signature() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let exp = Utc::now().timestamp() - 1;
        let sig = storage.signature("GET", "a.txt", exp);

        assert!(matches!(
            storage.verify("GET", "a.txt", exp, &sig),
            Err(StorageError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage.write("covers/nested/c.png", b"png-bytes").await.unwrap();
        assert_eq!(storage.read("covers/nested/c.png").await.unwrap(), b"png-bytes");
        assert!(dir.path().join("covers/nested/c.png").exists());

        assert!(matches!(
            storage.read("covers/missing.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.write("../escape.txt", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
