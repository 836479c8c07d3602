use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{detail_select, Detailed};
use crate::pagination::PageRequest;

/// Book a user wants to buy later. Maps to the `wishlists` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WishlistEntry {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type WishlistEntryDetail = Detailed<WishlistEntry>;

const COLUMNS: &str = "t.id, t.user_id, t.book_id, t.created_at, t.updated_at";

impl WishlistEntry {
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
    ) -> Result<WishlistEntry, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, WishlistEntry>(
            "INSERT INTO wishlists (id, user_id, book_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, user_id, book_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn exists(pool: &SqlitePool, user_id: &str, book_id: &str) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM wishlists WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    /// Entry `id` when it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<WishlistEntryDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.id = ? AND t.user_id = ?",
            detail_select("wishlists", COLUMNS)
        );
        sqlx::query_as::<_, WishlistEntryDetail>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        page: PageRequest,
    ) -> Result<(Vec<WishlistEntryDetail>, i64), sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wishlists WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "{} WHERE t.user_id = ? ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?",
            detail_select("wishlists", COLUMNS)
        );
        let items = sqlx::query_as::<_, WishlistEntryDetail>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    /// Returns whether the user's entry was removed.
    pub async fn delete_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM wishlists WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{seed_book, seed_user, test_pool};

    #[tokio::test]
    async fn test_entries_are_scoped_to_owner() {
        let (pool, _dir) = test_pool().await;
        let alice = seed_user(&pool, "alice@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;
        let book = seed_book(&pool, "Middlemarch", 1200).await;

        let entry = WishlistEntry::create(&pool, &alice.id, &book.id).await.unwrap();
        assert!(WishlistEntry::exists(&pool, &alice.id, &book.id).await.unwrap());

        let detail = WishlistEntry::find_for_user(&pool, &alice.id, &entry.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.book.title, "Middlemarch");
        assert_eq!(detail.user.email, "alice@example.com");

        assert!(WishlistEntry::find_for_user(&pool, &bob.id, &entry.id)
            .await
            .unwrap()
            .is_none());
        assert!(!WishlistEntry::delete_for_user(&pool, &bob.id, &entry.id).await.unwrap());

        let (items, total) = WishlistEntry::list_for_user(&pool, &alice.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].record.id, entry.id);

        assert!(WishlistEntry::delete_for_user(&pool, &alice.id, &entry.id).await.unwrap());
    }
}
