use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{contains_pattern, detail_select, Detailed, LIKE_ESCAPE};
use crate::pagination::PageRequest;

/// A book on a user's shelf. Maps to the `libraries` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LibraryEntry {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type LibraryEntryDetail = Detailed<LibraryEntry>;

const COLUMNS: &str = "t.id, t.user_id, t.book_id, t.source, t.created_at, t.updated_at";

impl LibraryEntry {
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
        source: &str,
    ) -> Result<LibraryEntry, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, LibraryEntry>(
            "INSERT INTO libraries (id, user_id, book_id, source, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id, user_id, book_id, source, created_at, updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(book_id)
        .bind(source)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Insert the entry unless the user already has the book; either way
    /// return the stored row.
    pub async fn ensure(
        conn: &mut SqliteConnection,
        user_id: &str,
        book_id: &str,
        source: &str,
    ) -> Result<LibraryEntry, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO libraries (id, user_id, book_id, source, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, book_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(book_id)
        .bind(source)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, LibraryEntry>(
            "SELECT id, user_id, book_id, source, created_at, updated_at
             FROM libraries WHERE user_id = ? AND book_id = ?",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn exists(pool: &SqlitePool, user_id: &str, book_id: &str) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM libraries WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<LibraryEntryDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.id = ? AND t.user_id = ?",
            detail_select("libraries", COLUMNS)
        );
        sqlx::query_as::<_, LibraryEntryDetail>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// The user's shelf, newest first; `q` matches book title or author.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        q: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<LibraryEntryDetail>, i64), sqlx::Error> {
        let pattern = q.and_then(contains_pattern);

        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM libraries t JOIN books b ON b.id = t.book_id",
        );
        push_conditions(&mut count_query, user_id, pattern.as_deref());
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(detail_select("libraries", COLUMNS));
        push_conditions(&mut query, user_id, pattern.as_deref());
        query
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<LibraryEntryDetail>()
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    pub async fn delete_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_conditions(query: &mut QueryBuilder<'_, Sqlite>, user_id: &str, pattern: Option<&str>) {
    query.push(" WHERE t.user_id = ").push_bind(user_id.to_string());

    if let Some(pattern) = pattern {
        query
            .push(" AND (b.title LIKE ")
            .push_bind(pattern.to_string())
            .push(LIKE_ESCAPE)
            .push(" OR b.author LIKE ")
            .push_bind(pattern.to_string())
            .push(LIKE_ESCAPE)
            .push(")");
    }
}
