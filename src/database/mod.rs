//! # Database
//!
//! SQLite connection management and the embedded schema migrations.
//!
//! - [`connection`] - pool construction, write transactions, health checks and migrations

pub mod connection;

pub use connection::{begin_write, ping, run_migrations, sqlite_file_path, DatabaseConnection};
