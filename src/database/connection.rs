use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::BackendError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open the pool described by `database_url`, creating the SQLite file
    /// (and its directory) when missing.
    pub async fn connect(config: &AppConfig) -> Result<Self, BackendError> {
        if let Some(path) = sqlite_file_path(&config.database_url) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        info!(
            max_connections = config.database_max_connections,
            "Database pool ready"
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }

    /// Apply any pending embedded migrations.
    pub async fn migrate(&self) -> Result<(), BackendError> {
        run_migrations(&self.pool).await
    }

    pub async fn health_check(&self) -> Result<bool, sqlx::Error> {
        ping(&self.pool).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Apply any pending embedded migrations to `pool`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), BackendError> {
    MIGRATOR.run(pool).await?;
    debug!("Database migrations applied");
    Ok(())
}

/// Begin a transaction holding SQLite's write lock from the start.
///
/// Deferred transactions that read before writing fail with `SQLITE_BUSY`
/// instead of waiting when another writer commits first.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// `SELECT 1` round trip used by the health endpoint.
pub async fn ping(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS health").fetch_one(pool).await?;
    let health: i64 = row.try_get("health")?;
    Ok(health == 1)
}

/// Filesystem path of a file-backed SQLite URL; `None` for in-memory databases.
pub fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;

    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    if path.is_empty() || path == ":memory:" || query.is_some_and(|q| q.contains("mode=memory")) {
        return None;
    }

    Some(PathBuf::from(path))
}
