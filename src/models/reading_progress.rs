use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{detail_select, Detailed};
use crate::database::begin_write;
use crate::pagination::PageRequest;

/// Where a user is in a book. Maps to the `reading_progress` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReadingProgress {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub progress_percent: f64,
    pub current_chapter: Option<String>,
    pub current_location: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type ReadingProgressDetail = Detailed<ReadingProgress>;

/// Fields supplied by a progress upsert. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub progress_percent: Option<f64>,
    pub current_chapter: Option<Option<String>>,
    pub current_location: Option<Option<String>>,
    pub is_completed: Option<bool>,
}

impl ProgressUpdate {
    /// Reaching 100% marks the book completed unless the caller says otherwise.
    pub fn apply(self, progress: &mut ReadingProgress) {
        if let Some(percent) = self.progress_percent {
            progress.progress_percent = percent;
        }
        if let Some(chapter) = self.current_chapter {
            progress.current_chapter = chapter;
        }
        if let Some(location) = self.current_location {
            progress.current_location = location;
        }

        match self.is_completed {
            Some(is_completed) => progress.is_completed = is_completed,
            None if self.progress_percent.is_some_and(|p| p >= 100.0) => {
                progress.is_completed = true
            }
            None => {}
        }
    }
}

const COLUMNS: &str = "t.id, t.user_id, t.book_id, t.progress_percent, t.current_chapter, \
     t.current_location, t.is_completed, t.created_at, t.updated_at";

impl ReadingProgress {
    fn blank(user_id: &str, book_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            progress_percent: 0.0,
            current_chapter: None,
            current_location: None,
            is_completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn find_for_user_book(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<ReadingProgressDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.user_id = ? AND t.book_id = ?",
            detail_select("reading_progress", COLUMNS)
        );
        sqlx::query_as::<_, ReadingProgressDetail>(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently touched first, optionally only (un)finished books.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        is_completed: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<ReadingProgressDetail>, i64), sqlx::Error> {
        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM reading_progress t");
        push_conditions(&mut count_query, user_id, is_completed);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(detail_select("reading_progress", COLUMNS));
        push_conditions(&mut query, user_id, is_completed);
        query
            .push(" ORDER BY t.updated_at DESC, t.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<ReadingProgressDetail>()
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    /// Create or update the user's progress for a book. Returns the stored
    /// row and whether it was newly created.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
        update: ProgressUpdate,
    ) -> Result<(ReadingProgressDetail, bool), sqlx::Error> {
        let mut tx = begin_write(pool).await?;

        let existing = sqlx::query_as::<_, ReadingProgress>(&format!(
            "SELECT {COLUMNS} FROM reading_progress t WHERE t.user_id = ? AND t.book_id = ?"
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let created = existing.is_none();
        let mut progress = existing.unwrap_or_else(|| Self::blank(user_id, book_id));
        update.apply(&mut progress);
        progress.updated_at = Utc::now();

        if created {
            sqlx::query(
                "INSERT INTO reading_progress (id, user_id, book_id, progress_percent, current_chapter,
                    current_location, is_completed, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&progress.id)
            .bind(&progress.user_id)
            .bind(&progress.book_id)
            .bind(progress.progress_percent)
            .bind(&progress.current_chapter)
            .bind(&progress.current_location)
            .bind(progress.is_completed)
            .bind(progress.created_at)
            .bind(progress.updated_at)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE reading_progress SET progress_percent = ?, current_chapter = ?,
                    current_location = ?, is_completed = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(progress.progress_percent)
            .bind(&progress.current_chapter)
            .bind(&progress.current_location)
            .bind(progress.is_completed)
            .bind(progress.updated_at)
            .bind(&progress.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let detail = Self::find_for_user_book(pool, user_id, book_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((detail, created))
    }
}

fn push_conditions(query: &mut QueryBuilder<'_, Sqlite>, user_id: &str, is_completed: Option<bool>) {
    query.push(" WHERE t.user_id = ").push_bind(user_id.to_string());
    if let Some(is_completed) = is_completed {
        query.push(" AND t.is_completed = ").push_bind(is_completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{seed_book, seed_user, test_pool};

    #[test]
    fn test_full_progress_marks_completed() {
        let mut progress = ReadingProgress::blank("u", "b");
        ProgressUpdate {
            progress_percent: Some(100.0),
            ..ProgressUpdate::default()
        }
        .apply(&mut progress);
        assert!(progress.is_completed);

        let mut progress = ReadingProgress::blank("u", "b");
        ProgressUpdate {
            progress_percent: Some(100.0),
            is_completed: Some(false),
            ..ProgressUpdate::default()
        }
        .apply(&mut progress);
        assert!(!progress.is_completed);
    }

    #[test]
    fn test_absent_fields_are_kept() {
        let mut progress = ReadingProgress::blank("u", "b");
        progress.current_chapter = Some("Chapter 3".to_string());

        ProgressUpdate {
            progress_percent: Some(42.0),
            ..ProgressUpdate::default()
        }
        .apply(&mut progress);
        assert_eq!(progress.current_chapter.as_deref(), Some("Chapter 3"));
        assert_eq!(progress.progress_percent, 42.0);

        ProgressUpdate {
            current_chapter: Some(None),
            ..ProgressUpdate::default()
        }
        .apply(&mut progress);
        assert_eq!(progress.current_chapter, None);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let (pool, _dir) = test_pool().await;
        let user = seed_user(&pool, "reader@example.com").await;
        let book = seed_book(&pool, "Dracula", 300).await;

        let (first, created) = ReadingProgress::upsert(
            &pool,
            &user.id,
            &book.id,
            ProgressUpdate {
                progress_percent: Some(10.0),
                current_chapter: Some(Some("I".to_string())),
                ..ProgressUpdate::default()
            },
        )
        .await
        .unwrap();
        assert!(created);
        assert_eq!(first.record.progress_percent, 10.0);
        assert_eq!(first.book.title, "Dracula");

        let (second, created) = ReadingProgress::upsert(
            &pool,
            &user.id,
            &book.id,
            ProgressUpdate {
                progress_percent: Some(55.5),
                ..ProgressUpdate::default()
            },
        )
        .await
        .unwrap();
        assert!(!created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.current_chapter.as_deref(), Some("I"));

        let (done, total) =
            ReadingProgress::list_for_user(&pool, &user.id, Some(true), PageRequest::default())
                .await
                .unwrap();
        assert!(done.is_empty());
        assert_eq!(total, 0);

        let (open, total) =
            ReadingProgress::list_for_user(&pool, &user.id, Some(false), PageRequest::default())
                .await
                .unwrap();
        assert_eq!(total, 1);
        assert_eq!(open[0].record.progress_percent, 55.5);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_all_commit() {
        let (pool, _dir) = test_pool().await;
        let book = seed_book(&pool, "Carmilla", 200).await;
        let mut readers = Vec::new();
        for i in 0..8 {
            readers.push(seed_user(&pool, &format!("reader{i}@example.com")).await);
        }

        let tasks: Vec<_> = readers
            .iter()
            .map(|user| {
                let pool = pool.clone();
                let user_id = user.id.clone();
                let book_id = book.id.clone();
                tokio::spawn(async move {
                    ReadingProgress::upsert(
                        &pool,
                        &user_id,
                        &book_id,
                        ProgressUpdate {
                            progress_percent: Some(20.0),
                            ..ProgressUpdate::default()
                        },
                    )
                    .await
                })
            })
            .collect();

        for task in tasks {
            let (progress, created) = task.await.unwrap().unwrap();
            assert!(created);
            assert_eq!(progress.record.progress_percent, 20.0);
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reading_progress")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 8);
    }
}
