use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{contains_pattern, LIKE_ESCAPE};
use crate::pagination::PageRequest;

/// Book category. Maps to the `categories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, FromRow)]
struct BookCategoryRow {
    book_id: String,
    id: String,
    name: String,
    slug: String,
}

const CATEGORY_COLUMNS: &str = "id, name, slug, created_at, updated_at";

/// URL-friendly slug: lower-case ASCII alphanumerics separated by single
/// hyphens. Names with nothing usable become `"category"`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "category".to_string()
    } else {
        slug
    }
}

impl Category {
    pub async fn create(pool: &SqlitePool, name: &str, slug: &str) -> Result<Category, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO categories (id, name, slug, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(slug)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Category>, sqlx::Error> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?");
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Category>, sqlx::Error> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?");
        sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Whether `slug` belongs to a category other than `except_id`.
    pub async fn slug_taken(
        pool: &SqlitePool,
        slug: &str,
        except_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE slug = ? AND (? IS NULL OR id <> ?)",
        )
        .bind(slug)
        .bind(except_id)
        .bind(except_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Page of categories ordered by name; `q` matches name or slug.
    pub async fn list(
        pool: &SqlitePool,
        q: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<Category>, i64), sqlx::Error> {
        let pattern = q.and_then(contains_pattern);

        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM categories");
        push_search(&mut count_query, pattern.as_deref());
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
        push_search(&mut query, pattern.as_deref());
        query
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as::<Category>().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        name: &str,
        slug: &str,
    ) -> Result<Category, sqlx::Error> {
        let sql = format!(
            "UPDATE categories SET name = ?, slug = ?, updated_at = ? WHERE id = ?
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(slug)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids from `ids` with no matching category.
    pub async fn missing_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<String>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM categories WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let found: Vec<String> = query.build_query_scalar().fetch_all(pool).await?;
        Ok(ids
            .iter()
            .filter(|id| !found.contains(id))
            .cloned()
            .collect())
    }

    /// Category summaries for each of `book_ids`, keyed by book id.
    pub async fn find_for_books(
        pool: &SqlitePool,
        book_ids: &[String],
    ) -> Result<HashMap<String, Vec<CategorySummary>>, sqlx::Error> {
        let mut by_book: HashMap<String, Vec<CategorySummary>> = HashMap::new();
        if book_ids.is_empty() {
            return Ok(by_book);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT bc.book_id, c.id, c.name, c.slug
             FROM book_categories bc
             JOIN categories c ON c.id = bc.category_id
             WHERE bc.book_id IN (",
        );
        let mut separated = query.separated(", ");
        for id in book_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY c.name ASC");

        let rows = query.build_query_as::<BookCategoryRow>().fetch_all(pool).await?;
        for row in rows {
            by_book.entry(row.book_id).or_default().push(CategorySummary {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
        }

        Ok(by_book)
    }

    pub fn summary(&self) -> CategorySummary {
        CategorySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

fn push_search(query: &mut QueryBuilder<'_, Sqlite>, pattern: Option<&str>) {
    if let Some(pattern) = pattern {
        query
            .push(" WHERE (name LIKE ")
            .push_bind(pattern.to_string())
            .push(LIKE_ESCAPE)
            .push(" OR slug LIKE ")
            .push_bind(pattern.to_string())
            .push(LIKE_ESCAPE)
            .push(")");
    }
}
