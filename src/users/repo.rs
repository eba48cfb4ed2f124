use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::users::repo_types::{NewUser, User, UserPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Key-unique record store for users. Lookups are exact and case-sensitive.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Applies `patch` atomically. Returns `None` if the user is gone.
    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Overwrites the stored session token.
    async fn set_token(&self, id: i64, token: &str) -> Result<(), StoreError>;

    /// Clears the stored token only while it still equals `token`.
    async fn clear_token(&self, id: i64, token: &str) -> Result<bool, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, access_token, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE access_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_token(&self, id: i64, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET access_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn clear_token(&self, id: i64, token: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE users SET access_token = NULL WHERE id = $1 AND access_token = $2",
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    const CREATE_USERS: &str =
        include_str!("../../migrations/20240501000000_create_users.sql");

    #[test]
    fn user_columns_have_no_length_cap() {
        let ddl = CREATE_USERS.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(!ddl.to_ascii_uppercase().contains("VARCHAR"));
        assert!(ddl.contains("name TEXT NOT NULL"));
        assert!(ddl.contains("email TEXT NOT NULL UNIQUE"));
    }
}
