// src/common/migrations.rs
//! Database migration and schema management
//!
//! Every step is idempotent so it can run on each startup. Older `users`
//! tables (password required, no provider link, no timestamps) are upgraded
//! in place.

use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Emails that collide once lower-cased; the rows must be merged by hand
    #[error("users table has emails that differ only by case: {0:?}")]
    CaseDuplicateEmails(Vec<String>),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Run all database migrations
pub async fn run_migrations(pool: &SqlitePool, reset_db: bool) -> Result<(), MigrationError> {
    if reset_db {
        warn!("⚠️  RESET_DB=true - Dropping users table and recreating schema...");
        sqlx::query("DROP TABLE IF EXISTS users").execute(pool).await?;
    }

    create_users_table(pool).await?;
    add_google_id_column(pool).await?;
    add_missing_columns(pool).await?;
    check_case_duplicate_emails(pool).await?;
    make_password_nullable(pool).await?;
    create_indexes(pool).await?;

    info!("✅ Database migration completed successfully!");
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            full_name TEXT,
            hashed_password TEXT,
            google_id TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Column name -> NOT NULL flag for the users table
async fn users_columns(pool: &SqlitePool) -> Result<Vec<(String, bool)>, sqlx::Error> {
    let rows = sqlx::query("PRAGMA table_info(users)").fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<(String, bool), sqlx::Error> {
            let name: String = row.try_get("name")?;
            let notnull: i64 = row.try_get("notnull")?;
            Ok((name, notnull != 0))
        })
        .collect()
}

async fn add_google_id_column(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let columns = users_columns(pool).await?;
    if columns.iter().any(|(name, _)| name == "google_id") {
        return Ok(());
    }

    info!("Adding google_id column to users");
    sqlx::query("ALTER TABLE users ADD COLUMN google_id TEXT")
        .execute(pool)
        .await?;
    Ok(())
}

/// Columns the oldest schemas lack. ALTER TABLE cannot add a column with a
/// non-constant default, so timestamps are backfilled.
async fn add_missing_columns(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let columns = users_columns(pool).await?;
    for column in ["full_name", "created_at", "updated_at"] {
        if columns.iter().any(|(name, _)| name == column) {
            continue;
        }

        info!(column = column, "Adding missing column to users");
        sqlx::query(&format!("ALTER TABLE users ADD COLUMN {} TEXT", column))
            .execute(pool)
            .await?;
        if column != "full_name" {
            sqlx::query(&format!(
                "UPDATE users SET {0} = datetime('now') WHERE {0} IS NULL",
                column
            ))
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// The rebuild and the NOCASE index both fail on such rows, so they are
/// reported up front.
async fn check_case_duplicate_emails(pool: &SqlitePool) -> Result<(), MigrationError> {
    let duplicates: Vec<(String,)> = sqlx::query_as(
        "SELECT lower(trim(email)) FROM users GROUP BY lower(trim(email)) HAVING COUNT(*) > 1",
    )
    .fetch_all(pool)
    .await?;
    if duplicates.is_empty() {
        return Ok(());
    }

    let emails: Vec<String> = duplicates.into_iter().map(|(email,)| email).collect();
    error!(
        count = emails.len(),
        emails = ?emails,
        "❌ users table has emails that differ only by case; merge these accounts before restarting"
    );
    Err(MigrationError::CaseDuplicateEmails(emails))
}

/// SQLite cannot relax NOT NULL in place, so the table is rebuilt when an
/// older schema still requires a password.
async fn make_password_nullable(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let columns = users_columns(pool).await?;
    let password_required = columns
        .iter()
        .any(|(name, notnull)| name == "hashed_password" && *notnull);
    if !password_required {
        return Ok(());
    }

    info!("Rebuilding users table to make hashed_password nullable");
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        CREATE TABLE users_rebuild (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            full_name TEXT,
            hashed_password TEXT,
            google_id TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "INSERT INTO users_rebuild (id, email, full_name, hashed_password, google_id, created_at, updated_at) \
         SELECT id, lower(trim(email)), full_name, hashed_password, google_id, \
                COALESCE(created_at, datetime('now')), COALESCE(updated_at, datetime('now')) \
         FROM users",
    )
    .execute(&mut *tx)
    .await?;
    sqlx::query("DROP TABLE users").execute(&mut *tx).await?;
    sqlx::query("ALTER TABLE users_rebuild RENAME TO users")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Only linked accounts participate; any number of rows may have no google_id.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS ix_users_google_id ON users(google_id) WHERE google_id IS NOT NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS ix_users_email_nocase ON users(email COLLATE NOCASE)")
        .execute(pool)
        .await?;
    Ok(())
}
