//! # System Constants
//!
//! Defaults and fixed vocabulary shared across the service: token types,
//! purchase and library states, paging limits and provider endpoints.

pub const DEFAULT_SECRET_KEY: &str = "change-me";

pub const REDACTED: &str = "***";

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Issuers Google uses in ID tokens.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

pub const BEARER_TOKEN_TYPE: &str = "bearer";

/// Pagination bounds
pub mod paging {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;
}

/// Presigned URL lifetimes, in seconds
pub mod presign {
    pub const DEFAULT_EXPIRES_IN: u64 = 600;
}

pub mod purchase_status {
    pub const COMPLETED: &str = "completed";
    pub const PENDING: &str = "pending";
    pub const REFUNDED: &str = "refunded";

    pub const ALL: [&str; 3] = [COMPLETED, PENDING, REFUNDED];
}

pub mod library_source {
    pub const PURCHASE: &str = "purchase";
    pub const MANUAL: &str = "manual";
    pub const GIFT: &str = "gift";

    pub const ALL: [&str; 3] = [PURCHASE, MANUAL, GIFT];
}

/// Admin statistics query bounds
pub mod stats {
    pub const DEFAULT_DAYS: u32 = 7;
    pub const DEFAULT_TOP_LIMIT: u32 = 5;
}

pub mod stripe {
    pub const API_BASE: &str = "https://api.stripe.com/v1";
    pub const SIGNATURE_HEADER: &str = "stripe-signature";
    /// Maximum age of a signed webhook, in seconds.
    pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;
}

pub mod razorpay {
    pub const API_BASE: &str = "https://api.razorpay.com/v1";
    pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
}
