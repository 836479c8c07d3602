//! # Google Sign-In
//!
//! Verifies Google ID tokens against Google's published RSA keys and maps
//! the verified identity onto a local user.
//!
//! Keys are fetched lazily and cached for the `max-age` Google advertises.
//! Concurrent cache misses coalesce on a single refresh, and a failed refresh
//! falls back to recently fetched keys.
//! A token naming a key id absent from a fresh key set is rejected without
//! refetching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::constants::GOOGLE_ISSUERS;
use crate::models::{NewUser, User};
use crate::services::auth::{AuthError, PasswordHasher};

const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);
const MAX_STALE: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Google OAuth is not configured")]
    NotConfigured,

    #[error("Invalid Google ID token: {0}")]
    InvalidToken(String),

    #[error("Google account email is not verified")]
    UnverifiedEmail,

    #[error("Google ID token has no email")]
    MissingEmail,

    #[error("Failed to fetch Google signing keys: {0}")]
    KeyFetch(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Hashing(#[from] AuthError),
}

/// Identity claims from a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub exp: i64,
}

/// Google encodes `email_verified` as a JSON bool in ID tokens but as a
/// string from some endpoints; accept both.
fn bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => Some(value),
        Some(Flag::Text(text)) => Some(text.eq_ignore_ascii_case("true")),
        None => None,
    })
}

/// Verifies an ID token for a given OAuth client id.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str, audience: &str) -> Result<GoogleClaims, OAuthError>;
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    ttl: Duration,
}

// `DecodingKey` has no Debug impl; key ids are enough to diagnose the cache.
impl std::fmt::Debug for CachedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("CachedKeys")
            .field("kids", &kids)
            .field("fetched_at", &self.fetched_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

enum KeyLookup {
    Found(DecodingKey),
    /// Fresh key set without this kid.
    Unknown,
    /// Nothing cached, or the cache has expired.
    Expired,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }

    fn is_usable_stale(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl + MAX_STALE
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    alg: Option<String>,
}

/// Production verifier backed by Google's JWKS endpoint.
#[derive(Debug)]
pub struct GoogleIdTokenVerifier {
    jwks_url: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
    refresh_lock: Arc<Mutex<()>>,
    client: reqwest::Client,
}

impl GoogleIdTokenVerifier {
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, OAuthError> {
        let jwks_url = jwks_url.into();
        validate_url(&jwks_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::KeyFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_url,
            cache: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
            client,
        })
    }

    async fn cached_key(&self, kid: &str, allow_stale: bool) -> Option<DecodingKey> {
        let cache = self.cache.read().await;
        let entry = cache.as_ref()?;
        let usable = entry.is_fresh() || (allow_stale && entry.is_usable_stale());
        if usable {
            entry.keys.get(kid).cloned()
        } else {
            None
        }
    }

    async fn lookup(&self, kid: &str) -> KeyLookup {
        let cache = self.cache.read().await;
        match cache.as_ref() {
            Some(entry) if entry.is_fresh() => match entry.keys.get(kid) {
                Some(key) => KeyLookup::Found(key.clone()),
                None => KeyLookup::Unknown,
            },
            _ => KeyLookup::Expired,
        }
    }

    async fn get_key(&self, kid: &str) -> Result<DecodingKey, OAuthError> {
        match self.lookup(kid).await {
            KeyLookup::Found(key) => return Ok(key),
            // Unknown kids never force a refetch while the key set is fresh
            KeyLookup::Unknown => return Err(unknown_kid(kid)),
            KeyLookup::Expired => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        match self.lookup(kid).await {
            KeyLookup::Found(key) => return Ok(key),
            KeyLookup::Unknown => return Err(unknown_kid(kid)),
            KeyLookup::Expired => {}
        }

        match self.refresh_keys().await {
            Ok(()) => self
                .cached_key(kid, false)
                .await
                .ok_or_else(|| unknown_kid(kid)),
            Err(err) => match self.cached_key(kid, true).await {
                Some(key) => {
                    warn!(error = %err, "Google key refresh failed, using stale keys");
                    Ok(key)
                }
                None => Err(err),
            },
        }
    }

    async fn refresh_keys(&self) -> Result<(), OAuthError> {
        debug!(url = %self.jwks_url, "Fetching Google signing keys");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| OAuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::KeyFetch(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_TTL);

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::KeyFetch(format!("invalid JWKS document: {e}")))?;

        let keys = decoding_keys(jwks);
        debug!(count = keys.len(), ttl_secs = ttl.as_secs(), "Google signing keys refreshed");

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            ttl,
        });
        Ok(())
    }

    #[cfg(test)]
    async fn preload(&self, jwks: JwksResponse) {
        *self.cache.write().await = Some(CachedKeys {
            keys: decoding_keys(jwks),
            fetched_at: Instant::now(),
            ttl: DEFAULT_KEY_TTL,
        });
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, id_token: &str, audience: &str) -> Result<GoogleClaims, OAuthError> {
        let header =
            decode_header(id_token).map_err(|e| OAuthError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(OAuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OAuthError::InvalidToken("missing key id".to_string()))?;

        let key = self.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| OAuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

fn unknown_kid(kid: &str) -> OAuthError {
    OAuthError::InvalidToken(format!("unknown key id '{kid}'"))
}

fn decoding_keys(jwks: JwksResponse) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();
    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
            continue;
        };

        match DecodingKey::from_rsa_components(&n, &e) {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(err) => warn!(kid = %kid, error = %err, "Skipping malformed JWKS key"),
        }
    }
    keys
}

fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn validate_url(url: &str) -> Result<(), OAuthError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| OAuthError::KeyFetch(format!("invalid JWKS URL: {e}")))?;

    if parsed.scheme() != "https" {
        return Err(OAuthError::KeyFetch(format!(
            "JWKS URL must use HTTPS (got '{}')",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(OAuthError::KeyFetch("JWKS URL has no host".to_string()));
    }
    Ok(())
}

/// Find the user behind verified Google claims, creating one on first sign-in.
///
/// Existing users get their name and avatar refreshed from Google when those
/// changed. New users receive an unusable random password.
pub async fn get_or_create_user_from_google(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    claims: &GoogleClaims,
) -> Result<User, OAuthError> {
    let email = claims
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or(OAuthError::MissingEmail)?;

    if claims.email_verified == Some(false) {
        return Err(OAuthError::UnverifiedEmail);
    }

    if let Some(user) = User::find_by_email(pool, email).await? {
        let name = claims.name.as_deref().or(user.full_name.as_deref());
        let avatar = claims.picture.as_deref().or(user.avatar_url.as_deref());

        if name != user.full_name.as_deref() || avatar != user.avatar_url.as_deref() {
            debug!(user_id = %user.id, "Refreshing profile from Google");
            return Ok(User::update_profile(pool, &user.id, name, avatar).await?);
        }
        return Ok(user);
    }

    let random_password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let hashed_password = hasher.hash(&random_password).await?;

    let user = User::create(
        pool,
        NewUser {
            email: email.to_string(),
            hashed_password,
            full_name: claims.name.clone(),
            avatar_url: claims.picture.clone(),
            is_superuser: false,
        },
    )
    .await?;

    info!(user_id = %user.id, "Created user from Google sign-in");
    Ok(user)
}
