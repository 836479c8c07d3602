//! # Session Authentication
//!
//! HMAC-signed JWT access/refresh tokens and bcrypt password hashing.
//!
//! Access tokens are short lived and carry the user's email; refresh tokens
//! live longer and can only be exchanged at `/auth/refresh`. Both carry a
//! `type` claim, and validation always names the type it expects so one kind
//! can never stand in for the other.

use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AppConfig, ConfigError};
use crate::constants::BEARER_TOKEN_TYPE;
use crate::models::User;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("JWT processing error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Issues and validates session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::ConfigurationError(
                "JWT secret not configured".to_string(),
            ));
        }
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::ConfigurationError(format!(
                "{algorithm:?} is not an HMAC algorithm"
            )));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        Self::new(
            &config.secret_key,
            config.jwt_algorithm()?,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::minutes(config.refresh_token_expire_minutes),
        )
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(&user.id, TokenType::Access, Some(&user.email))?,
            refresh_token: self.issue(&user.id, TokenType::Refresh, None)?,
            token_type: BEARER_TOKEN_TYPE.to_string(),
        })
    }

    pub fn issue(
        &self,
        subject: &str,
        token_type: TokenType,
        email: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: subject.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            email: email.map(str::to_string),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        debug!(user_id = %subject, token_type = ?token_type, "Issued token");
        Ok(token)
    }

    /// Verify signature and expiry, then require `expected` as the token type.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "Token validation failed");
            AuthError::JwtError(e)
        })?;

        if data.claims.token_type != expected {
            warn!(
                user_id = %data.claims.sub,
                expected = ?expected,
                actual = ?data.claims.token_type,
                "Token type mismatch"
            );
            return Err(AuthError::InvalidToken("Invalid token type".to_string()));
        }

        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(auth_header: &HeaderValue) -> Result<&str, AuthError> {
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthFormat)?;

    let (scheme, token) = auth_str
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthFormat)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthFormat);
    }

    Ok(token)
}

/// bcrypt hashing on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::HashingError(e.to_string()))?
            .map_err(|e| AuthError::HashingError(e.to_string()))
    }

    /// `false` for a wrong password and for malformed hashes alike.
    pub async fn verify(&self, password: &str, hashed: &str) -> bool {
        let password = password.to_string();
        let hashed = hashed.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}
