use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{detail_select, Detailed};
use crate::constants::purchase_status;
use crate::pagination::PageRequest;

/// A user's purchase of a book. Maps to the `purchases` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub price_cents: i64,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type PurchaseDetail = Detailed<Purchase>;

/// New Purchase for creation (without generated fields)
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: String,
    pub book_id: String,
    pub price_cents: i64,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub status: String,
}

/// A completed sale reduced to what daily aggregation needs.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SaleRecord {
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TopBook {
    pub book_id: String,
    pub title: String,
    pub count: i64,
}

const COLUMNS: &str = "t.id, t.user_id, t.book_id, t.price_cents, t.currency, \
     t.transaction_id, t.status, t.created_at, t.updated_at";

const RETURNING: &str = "RETURNING id, user_id, book_id, price_cents, currency, \
     transaction_id, status, created_at, updated_at";

impl Purchase {
    pub async fn create(
        conn: &mut SqliteConnection,
        new_purchase: NewPurchase,
    ) -> Result<Purchase, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO purchases (id, user_id, book_id, price_cents, currency, transaction_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             {RETURNING}"
        );
        sqlx::query_as::<_, Purchase>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(new_purchase.user_id)
            .bind(new_purchase.book_id)
            .bind(new_purchase.price_cents)
            .bind(new_purchase.currency)
            .bind(new_purchase.transaction_id)
            .bind(new_purchase.status)
            .bind(now)
            .bind(now)
            .fetch_one(conn)
            .await
    }

    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<PurchaseDetail>, sqlx::Error> {
        let sql = format!(
            "{} WHERE t.id = ? AND t.user_id = ?",
            detail_select("purchases", COLUMNS)
        );
        sqlx::query_as::<_, PurchaseDetail>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        page: PageRequest,
    ) -> Result<(Vec<PurchaseDetail>, i64), sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "{} WHERE t.user_id = ? ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?",
            detail_select("purchases", COLUMNS)
        );
        let items = sqlx::query_as::<_, PurchaseDetail>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    pub async fn find_by_transaction_id(
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> Result<Option<Purchase>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM purchases t WHERE t.transaction_id = ? LIMIT 1",
            COLUMNS
        );
        sqlx::query_as::<_, Purchase>(&sql)
            .bind(transaction_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_user_and_book(
        conn: &mut SqliteConnection,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<Purchase>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM purchases t WHERE t.user_id = ? AND t.book_id = ?",
            COLUMNS
        );
        sqlx::query_as::<_, Purchase>(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(conn)
            .await
    }

    /// Completed sales created at or after `since`, oldest first.
    pub async fn completed_since(
        pool: &SqlitePool,
        since: DateTime<Utc>,
    ) -> Result<Vec<SaleRecord>, sqlx::Error> {
        sqlx::query_as::<_, SaleRecord>(
            "SELECT price_cents, created_at FROM purchases
             WHERE status = ? AND created_at >= ?
             ORDER BY created_at ASC",
        )
        .bind(purchase_status::COMPLETED)
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Best sellers by completed purchase count; ties break on title.
    pub async fn top_books(pool: &SqlitePool, limit: u32) -> Result<Vec<TopBook>, sqlx::Error> {
        sqlx::query_as::<_, TopBook>(
            "SELECT b.id AS book_id, b.title AS title, COUNT(p.id) AS count
             FROM purchases p
             JOIN books b ON b.id = p.book_id
             WHERE p.status = ?
             GROUP BY b.id, b.title
             ORDER BY count DESC, b.title ASC
             LIMIT ?",
        )
        .bind(purchase_status::COMPLETED)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
    }

    /// `(revenue_cents, purchase_count)` over completed purchases.
    pub async fn completed_totals(pool: &SqlitePool) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(price_cents), 0), COUNT(*) FROM purchases WHERE status = ?",
        )
        .bind(purchase_status::COMPLETED)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{seed_book, seed_user, test_pool};

    fn completed(user_id: &str, book_id: &str, price_cents: i64, tx: Option<&str>) -> NewPurchase {
        NewPurchase {
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            price_cents,
            currency: "USD".to_string(),
            transaction_id: tx.map(str::to_string),
            status: purchase_status::COMPLETED.to_string(),
        }
    }

    #[tokio::test]
    async fn test_lookup_by_transaction_and_owner() {
        let (pool, _dir) = test_pool().await;
        let user = seed_user(&pool, "buyer@example.com").await;
        let book = seed_book(&pool, "Ulysses", 1500).await;
        let mut conn = pool.acquire().await.unwrap();

        let purchase = Purchase::create(&mut conn, completed(&user.id, &book.id, 1500, Some("tx_1")))
            .await
            .unwrap();

        let by_tx = Purchase::find_by_transaction_id(&mut conn, "tx_1").await.unwrap();
        assert_eq!(by_tx.map(|p| p.id), Some(purchase.id.clone()));

        let by_pair = Purchase::find_by_user_and_book(&mut conn, &user.id, &book.id)
            .await
            .unwrap();
        assert_eq!(by_pair.map(|p| p.id), Some(purchase.id.clone()));

        let duplicate = Purchase::create(&mut conn, completed(&user.id, &book.id, 1500, None)).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_statistics_only_count_completed() {
        let (pool, _dir) = test_pool().await;
        let alice = seed_user(&pool, "alice@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;
        let popular = seed_book(&pool, "Popular", 1000).await;
        let niche = seed_book(&pool, "Niche", 500).await;
        let mut conn = pool.acquire().await.unwrap();

        Purchase::create(&mut conn, completed(&alice.id, &popular.id, 1000, None)).await.unwrap();
        Purchase::create(&mut conn, completed(&bob.id, &popular.id, 1000, None)).await.unwrap();
        Purchase::create(
            &mut conn,
            NewPurchase {
                status: purchase_status::REFUNDED.to_string(),
                ..completed(&alice.id, &niche.id, 500, None)
            },
        )
        .await
        .unwrap();
        drop(conn);

        let (revenue, count) = Purchase::completed_totals(&pool).await.unwrap();
        assert_eq!(revenue, 2000);
        assert_eq!(count, 2);

        let top = Purchase::top_books(&pool, 5).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].title, "Popular");
        assert_eq!(top[0].count, 2);

        let since = Utc::now() - chrono::Duration::days(1);
        let sales = Purchase::completed_since(&pool, since).await.unwrap();
        assert_eq!(sales.len(), 2);
    }
}
