use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Account holder. Maps to the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New User for creation (without generated fields)
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_superuser: bool,
}

/// Compact user view embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, hashed_password, full_name, avatar_url, is_active, is_superuser, created_at, updated_at";

impl User {
    pub async fn create(pool: &SqlitePool, new_user: NewUser) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, email, hashed_password, full_name, avatar_url, is_active, is_superuser, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(new_user.email.trim().to_lowercase())
            .bind(new_user.hashed_password)
            .bind(new_user.full_name)
            .bind(new_user.avatar_url)
            .bind(new_user.is_superuser)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Emails are stored lower-cased, so lookups are case-insensitive.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Overwrite display name and avatar.
    pub async fn update_profile(
        pool: &SqlitePool,
        id: &str,
        full_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET full_name = ?, avatar_url = ?, updated_at = ? WHERE id = ?
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(full_name)
            .bind(avatar_url)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn set_superuser(
        pool: &SqlitePool,
        id: &str,
        is_superuser: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_superuser = ?, updated_at = ? WHERE id = ?")
            .bind(is_superuser)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_active(pool: &SqlitePool, id: &str, is_active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
        }
    }
}
