//! Account persistence
//!
//! Uniqueness of `email` and of non-null `google_id` is enforced by the
//! schema; a violated constraint comes back as [`StoreError::UniqueViolation`]
//! so the resolver can tell a lost race from a real failure.

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error};

use super::models::Account;
use crate::common::generate_user_id;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("uniqueness constraint violated")]
    UniqueViolation,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fields for a provider-only account. No password is ever set here.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub full_name: Option<String>,
    pub google_id: String,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Attaches `google_id` to an account that has none and fills an absent
    /// `full_name`. Returns `None` when the account was linked in the meantime.
    async fn link_google_id(
        &self,
        id: &str,
        google_id: &str,
        full_name: Option<&str>,
    ) -> Result<Option<Account>, StoreError>;
}

#[derive(Clone, Debug)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE google_id = ?")
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let id = generate_user_id();
        debug!(user_id = %id, "Inserting provider-only account");

        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (id, email, full_name, hashed_password, google_id)
            VALUES (?, ?, ?, NULL, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&account.email)
        .bind(account.full_name.as_deref())
        .bind(&account.google_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let mapped = map_write_error(e);
            if let StoreError::Database(inner) = &mapped {
                error!(error = %inner, user_id = %id, "Database error inserting account");
            }
            mapped
        })
    }

    async fn link_google_id(
        &self,
        id: &str,
        google_id: &str,
        full_name: Option<&str>,
    ) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE users
            SET google_id = ?,
                full_name = COALESCE(NULLIF(full_name, ''), ?),
                updated_at = datetime('now')
            WHERE id = ? AND google_id IS NULL
            RETURNING *
            "#,
        )
        .bind(google_id)
        .bind(full_name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)
    }
}
