//! Database module.
//!
//! SQLite is the source of truth for users, teams, pull requests and reviewer
//! links. The services only see the storage port defined in `store`.

#[cfg(test)]
mod memory;
mod repository;
mod store;

#[cfg(test)]
pub use memory::InMemoryStore;
pub use repository::*;
pub use store::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Initialize the database connection pool and create the schema.
pub async fn init_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    // Ensure the parent directory exists
    if let Some(parent) = options.get_filename().parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_name TEXT PRIMARY KEY
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            team_name TEXT NOT NULL REFERENCES teams(team_name),
            is_active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pull_requests (
            pull_request_id TEXT PRIMARY KEY,
            pull_request_name TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES users(user_id),
            status TEXT NOT NULL CHECK (status IN ('OPEN', 'MERGED')),
            created_at TEXT NOT NULL,
            merged_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviewers (
            pull_request_id TEXT NOT NULL REFERENCES pull_requests(pull_request_id),
            user_id TEXT NOT NULL REFERENCES users(user_id),
            PRIMARY KEY (pull_request_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_team_active ON users(team_name, is_active);
        CREATE INDEX IF NOT EXISTS idx_reviewers_user ON reviewers(user_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
