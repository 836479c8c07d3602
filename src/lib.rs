#![allow(clippy::doc_markdown)] // Allow technical terms like SQLite, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # KindlePlus Backend
//!
//! REST backend for the KindlePlus e-book store.
//!
//! ## Overview
//!
//! Users register with a password or sign in with a Google ID token, browse
//! a catalog of books filed under categories, keep a wishlist, buy books and
//! read them from their library while the service tracks reading progress.
//! Payments go through Stripe, Razorpay or a mock provider; book files are
//! served through presigned URLs from local disk, S3 or GCS.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven configuration
//! - [`database`] - SQLite pool and embedded migrations
//! - [`models`] - Tables and the SQL that reads and writes them
//! - [`services`] - Tokens, password hashing, Google sign-in, payments, storage
//! - [`web`] - Axum router, handlers, middleware and extractors
//! - [`pagination`] - Page requests and paginated responses
//! - [`error`] - Startup-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kindleplus::config::AppConfig;
//! use kindleplus::database::DatabaseConnection;
//! use kindleplus::web::{create_app, state::AppState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let db = DatabaseConnection::connect(&config).await?;
//! db.migrate().await?;
//!
//! let state = AppState::new(config, db.pool().clone())?;
//! let app = create_app(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod services;
pub mod web;

pub use config::AppConfig;
pub use error::{BackendError, Result};
