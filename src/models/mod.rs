//! # Data Models
//!
//! One module per table. Each model is a `FromRow` struct whose associated
//! functions own the SQL for that table; handlers never build queries directly.
//!
//! Listings of per-user resources (wishlist, purchases, library, reading
//! progress) join the owning user and the book so responses can embed
//! [`UserSummary`] and [`BookSummary`] without extra round trips.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

pub mod book;
pub mod category;
pub mod library;
pub mod purchase;
pub mod reading_progress;
pub mod user;
pub mod wishlist;

pub use book::{Book, BookChanges, BookFilter, BookSummary, NewBook};
pub use category::{slugify, Category, CategorySummary};
pub use library::{LibraryEntry, LibraryEntryDetail};
pub use purchase::{NewPurchase, Purchase, PurchaseDetail};
pub use reading_progress::{ProgressUpdate, ReadingProgress, ReadingProgressDetail};
pub use user::{NewUser, User, UserSummary};
pub use wishlist::{WishlistEntry, WishlistEntryDetail};

/// A per-user record together with summaries of its owner and book.
///
/// Decoded from rows selected through [`detail_select`], which aliases the
/// joined columns as `user_email`, `user_full_name`, `book_title` and
/// `book_author`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detailed<T> {
    #[serde(flatten)]
    pub record: T,
    pub user: UserSummary,
    pub book: BookSummary,
}

impl<'r, T> FromRow<'r, SqliteRow> for Detailed<T>
where
    T: FromRow<'r, SqliteRow>,
{
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            record: T::from_row(row)?,
            user: UserSummary {
                id: row.try_get("user_id")?,
                email: row.try_get("user_email")?,
                full_name: row.try_get("user_full_name")?,
            },
            book: BookSummary {
                id: row.try_get("book_id")?,
                title: row.try_get("book_title")?,
                author: row.try_get("book_author")?,
            },
        })
    }
}

/// `SELECT` over `table` (aliased `t`) joined to its user and book.
/// `columns` must be qualified with `t.`.
pub(crate) fn detail_select(table: &str, columns: &str) -> String {
    format!(
        "SELECT {columns}, u.email AS user_email, u.full_name AS user_full_name, \
         b.title AS book_title, b.author AS book_author \
         FROM {table} t \
         JOIN users u ON u.id = t.user_id \
         JOIN books b ON b.id = t.book_id"
    )
}

/// Suffix for `LIKE` comparisons built by [`contains_pattern`].
pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%term%` with LIKE wildcards in the term escaped. `None` for blank input.
pub(crate) fn contains_pattern(raw: &str) -> Option<String> {
    let term = raw.trim();
    if term.is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}
