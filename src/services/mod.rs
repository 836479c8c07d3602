//! Business services that sit between the HTTP handlers and the outside
//! world: session tokens, Google sign-in, payment providers and object
//! storage.

pub mod auth;
pub mod google_oauth;
pub mod payments;
pub mod signing;
pub mod storage;

pub use auth::{AuthError, Claims, PasswordHasher, TokenPair, TokenService, TokenType};
pub use google_oauth::{
    get_or_create_user_from_google, GoogleClaims, GoogleIdTokenVerifier, IdTokenVerifier, OAuthError,
};
pub use payments::{
    provider_from_config, CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider,
    WebhookEvent,
};
pub use storage::{
    normalize_key, storage_from_config, LocalStorage, PresignedUpload, StorageBackend, StorageError,
};
