use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{contains_pattern, LIKE_ESCAPE};
use crate::pagination::PageRequest;

/// Catalog entry. Maps to the `books` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub file_url: Option<String>,
    pub sample_file_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub published_date: Option<NaiveDate>,
    pub isbn: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<i64>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Book for creation (without generated fields)
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub file_url: Option<String>,
    pub sample_file_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub published_date: Option<NaiveDate>,
    pub isbn: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<i64>,
    pub rating: Option<f64>,
}

/// Partial update. `None` leaves a field alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<Option<String>>,
    pub cover_image_url: Option<Option<String>>,
    pub file_url: Option<Option<String>>,
    pub sample_file_url: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub published_date: Option<Option<NaiveDate>>,
    pub isbn: Option<Option<String>>,
    pub language: Option<Option<String>>,
    pub page_count: Option<Option<i64>>,
    pub rating: Option<Option<f64>>,
}

impl BookChanges {
    pub fn apply(self, book: &mut Book) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut book.title, self.title);
        set(&mut book.author, self.author);
        set(&mut book.description, self.description);
        set(&mut book.cover_image_url, self.cover_image_url);
        set(&mut book.file_url, self.file_url);
        set(&mut book.sample_file_url, self.sample_file_url);
        set(&mut book.price_cents, self.price_cents);
        set(&mut book.currency, self.currency);
        set(&mut book.published_date, self.published_date);
        set(&mut book.isbn, self.isbn);
        set(&mut book.language, self.language);
        set(&mut book.page_count, self.page_count);
        set(&mut book.rating, self.rating);
    }
}

/// Catalog search criteria. All present criteria must match.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub q: Option<String>,
    pub author: Option<String>,
    pub category_id: Option<String>,
    pub category_slug: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
}

/// Compact book view embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
}

const BOOK_COLUMNS: &str = "id, title, author, description, cover_image_url, file_url, \
     sample_file_url, price_cents, currency, published_date, isbn, language, page_count, \
     rating, created_at, updated_at";

impl Book {
    pub async fn create(conn: &mut SqliteConnection, new_book: NewBook) -> Result<Book, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO books ({BOOK_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {BOOK_COLUMNS}"
        );

        sqlx::query_as::<_, Book>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(new_book.title)
            .bind(new_book.author)
            .bind(new_book.description)
            .bind(new_book.cover_image_url)
            .bind(new_book.file_url)
            .bind(new_book.sample_file_url)
            .bind(new_book.price_cents)
            .bind(new_book.currency)
            .bind(new_book.published_date)
            .bind(new_book.isbn)
            .bind(new_book.language)
            .bind(new_book.page_count)
            .bind(new_book.rating)
            .bind(now)
            .bind(now)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Book>, sqlx::Error> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Persist every mutable column of `book` and bump `updated_at`.
    pub async fn save(conn: &mut SqliteConnection, book: &Book) -> Result<Book, sqlx::Error> {
        let sql = format!(
            "UPDATE books SET title = ?, author = ?, description = ?, cover_image_url = ?,
                file_url = ?, sample_file_url = ?, price_cents = ?, currency = ?,
                published_date = ?, isbn = ?, language = ?, page_count = ?, rating = ?,
                updated_at = ?
             WHERE id = ?
             RETURNING {BOOK_COLUMNS}"
        );

        sqlx::query_as::<_, Book>(&sql)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.description)
            .bind(&book.cover_image_url)
            .bind(&book.file_url)
            .bind(&book.sample_file_url)
            .bind(book.price_cents)
            .bind(&book.currency)
            .bind(book.published_date)
            .bind(&book.isbn)
            .bind(&book.language)
            .bind(book.page_count)
            .bind(book.rating)
            .bind(Utc::now())
            .bind(&book.id)
            .fetch_one(conn)
            .await
    }

    /// Returns whether a row was removed. Dependent rows cascade.
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the book's category set.
    pub async fn set_categories(
        conn: &mut SqliteConnection,
        book_id: &str,
        category_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM book_categories WHERE book_id = ?")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;

        for category_id in category_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO book_categories (book_id, category_id) VALUES (?, ?)",
            )
            .bind(book_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Filtered page of books, newest first, with the total match count.
    pub async fn list(
        pool: &SqlitePool,
        filter: &BookFilter,
        page: PageRequest,
    ) -> Result<(Vec<Book>, i64), sqlx::Error> {
        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM books");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BOOK_COLUMNS} FROM books"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as::<Book>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(pool)
            .await
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
        }
    }
}

fn push_clause(query: &mut QueryBuilder<'_, Sqlite>, first: &mut bool) {
    query.push(if *first { " WHERE " } else { " AND " });
    *first = false;
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &BookFilter) {
    let mut first = true;

    if let Some(pattern) = filter.q.as_deref().and_then(contains_pattern) {
        push_clause(query, &mut first);
        query
            .push("(title LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR author LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR COALESCE(description, '') LIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }

    if let Some(pattern) = filter.author.as_deref().and_then(contains_pattern) {
        push_clause(query, &mut first);
        query.push("author LIKE ").push_bind(pattern).push(LIKE_ESCAPE);
    }

    if let Some(category_id) = filter.category_id.as_deref().filter(|s| !s.is_empty()) {
        push_clause(query, &mut first);
        query
            .push(
                "EXISTS (SELECT 1 FROM book_categories bc \
                 WHERE bc.book_id = books.id AND bc.category_id = ",
            )
            .push_bind(category_id.to_string())
            .push(")");
    }

    if let Some(slug) = filter.category_slug.as_deref().filter(|s| !s.is_empty()) {
        push_clause(query, &mut first);
        query
            .push(
                "EXISTS (SELECT 1 FROM book_categories bc \
                 JOIN categories c ON c.id = bc.category_id \
                 WHERE bc.book_id = books.id AND c.slug = ",
            )
            .push_bind(slug.to_string())
            .push(")");
    }

    if let Some(price_min) = filter.price_min {
        push_clause(query, &mut first);
        query.push("price_cents >= ").push_bind(price_min);
    }

    if let Some(price_max) = filter.price_max {
        push_clause(query, &mut first);
        query.push("price_cents <= ").push_bind(price_max);
    }
}
