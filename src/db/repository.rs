//! SQLite storage gateway.
//!
//! Uses prepared statements inside a caller-owned transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{PullRequestRepository, Store, StoreTx, TeamRepository, UserRepository};
use crate::errors::AppError;
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus, Team, TeamMember, User};

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check that the database answers.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        // Take the write lock up front. A deferred transaction that reads
        // first cannot upgrade once another writer has committed, and SQLite
        // reports that as SQLITE_BUSY without waiting on busy_timeout.
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

/// One open SQLite transaction. sqlx rolls it back on drop if it was not
/// committed.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTx {
    async fn reviewers_of(&mut self, pull_request_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT user_id FROM reviewers WHERE pull_request_id = ? ORDER BY user_id",
        )
        .bind(pull_request_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let reviewers: Vec<String> = rows
            .iter()
            .map(|row| row.try_get("user_id"))
            .collect::<Result<_, _>>()?;
        Ok(reviewers)
    }
}

// ==================== USER OPERATIONS ====================

#[async_trait]
impl UserRepository for SqliteTx {
    async fn upsert_user(&mut self, member: &TeamMember, team_name: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO users (user_id, username, team_name, is_active)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (user_id) DO UPDATE
               SET username = excluded.username,
                   team_name = excluded.team_name,
                   is_active = excluded.is_active"#,
        )
        .bind(&member.user_id)
        .bind(&member.username)
        .bind(team_name)
        .bind(member.is_active)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
            .bind(is_active)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn active_users_by_team(
        &mut self,
        team_name: &str,
        exclude_user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<User>, AppError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = if limit == 0 { -1 } else { limit as i64 };

        let rows = sqlx::query(
            r#"SELECT user_id, username, team_name, is_active
               FROM users
               WHERE team_name = ? AND is_active = 1 AND (? IS NULL OR user_id != ?)
               ORDER BY RANDOM()
               LIMIT ?"#,
        )
        .bind(team_name)
        .bind(exclude_user_id)
        .bind(exclude_user_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        let users: Vec<User> = rows.iter().map(user_from_row).collect::<Result<_, _>>()?;
        Ok(users)
    }

    async fn team_of_user(&mut self, user_id: &str) -> Result<Option<String>, AppError> {
        let team = sqlx::query_scalar("SELECT team_name FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(team)
    }
}

// ==================== TEAM OPERATIONS ====================

#[async_trait]
impl TeamRepository for SqliteTx {
    async fn create_team(&mut self, team_name: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("INSERT INTO teams (team_name) VALUES (?) ON CONFLICT (team_name) DO NOTHING")
                .bind(team_name)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError> {
        let exists: Option<String> =
            sqlx::query_scalar("SELECT team_name FROM teams WHERE team_name = ?")
                .bind(team_name)
                .fetch_optional(&mut *self.tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT user_id, username, team_name, is_active FROM users WHERE team_name = ? ORDER BY user_id",
        )
        .bind(team_name)
        .fetch_all(&mut *self.tx)
        .await?;

        let members: Vec<TeamMember> = rows
            .iter()
            .map(|row| user_from_row(row).map(TeamMember::from))
            .collect::<Result<_, _>>()?;

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }
}

// ==================== PULL REQUEST OPERATIONS ====================

#[async_trait]
impl PullRequestRepository for SqliteTx {
    async fn create_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO pull_requests
                   (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&pr.pull_request_id)
        .bind(&pr.pull_request_name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(pr.created_at)
        .bind(pr.merged_at)
        .execute(&mut *self.tx)
        .await?;

        for reviewer_id in &pr.assigned_reviewers {
            self.add_reviewer(&pr.pull_request_id, reviewer_id).await?;
        }
        Ok(())
    }

    async fn get_pull_request(
        &mut self,
        pull_request_id: &str,
    ) -> Result<Option<PullRequest>, AppError> {
        let row = sqlx::query(
            r#"SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at
               FROM pull_requests WHERE pull_request_id = ?"#,
        )
        .bind(pull_request_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reviewers = self.reviewers_of(pull_request_id).await?;
        Ok(Some(pull_request_from_row(&row, reviewers)?))
    }

    async fn lock_pull_request(&mut self, pull_request_id: &str) -> Result<bool, AppError> {
        // A no-op write makes SQLite take the write lock now, before any read.
        let result = sqlx::query(
            "UPDATE pull_requests SET status = status WHERE pull_request_id = ?",
        )
        .bind(pull_request_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn merge_pull_request(
        &mut self,
        pull_request_id: &str,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE pull_requests SET status = ?, merged_at = ? WHERE pull_request_id = ? AND status = ?",
        )
        .bind(PullRequestStatus::Merged.as_str())
        .bind(merged_at)
        .bind(pull_request_id)
        .bind(PullRequestStatus::Open.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_reviewer(&mut self, pull_request_id: &str, user_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO reviewers (pull_request_id, user_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(pull_request_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn remove_reviewer(
        &mut self,
        pull_request_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM reviewers WHERE pull_request_id = ? AND user_id = ?")
            .bind(pull_request_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn pull_requests_by_reviewer(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        let rows = sqlx::query(
            r#"SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.status
               FROM pull_requests pr
               JOIN reviewers rev ON pr.pull_request_id = rev.pull_request_id
               WHERE rev.user_id = ?
               ORDER BY pr.created_at, pr.pull_request_id"#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<PullRequestShort, AppError> {
                Ok(PullRequestShort {
                    pull_request_id: row.try_get("pull_request_id")?,
                    pull_request_name: row.try_get("pull_request_name")?,
                    author_id: row.try_get("author_id")?,
                    status: status_from_row(row)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        team_name: row.try_get("team_name")?,
        is_active: row.try_get("is_active")?,
    })
}

fn status_from_row(row: &SqliteRow) -> Result<PullRequestStatus, AppError> {
    let status: String = row.try_get("status")?;
    status.parse()
}

fn pull_request_from_row(row: &SqliteRow, reviewers: Vec<String>) -> Result<PullRequest, AppError> {
    Ok(PullRequest {
        pull_request_id: row.try_get("pull_request_id")?,
        pull_request_name: row.try_get("pull_request_name")?,
        author_id: row.try_get("author_id")?,
        status: status_from_row(row)?,
        assigned_reviewers: reviewers,
        created_at: row.try_get("created_at")?,
        merged_at: row.try_get("merged_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{in_transaction, init_database};
    use tempfile::TempDir;

    async fn store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite:{}", temp_dir.path().join("test.sqlite").display());
        let pool = init_database(&url).await.expect("Failed to init DB");
        (SqliteStore::new(pool), temp_dir)
    }

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: format!("user {id}"),
            is_active: active,
        }
    }

    async fn seed(store: &SqliteStore) {
        in_transaction(store, "seed", |tx| {
            Box::pin(async move {
                tx.create_team("backend").await?;
                tx.upsert_user(&member("a", true), "backend").await?;
                tx.upsert_user(&member("b", true), "backend").await?;
                tx.upsert_user(&member("c", true), "backend").await?;
                tx.upsert_user(&member("d", false), "backend").await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    }

    fn open_pr(id: &str, reviewers: &[&str]) -> PullRequest {
        PullRequest {
            pull_request_id: id.to_string(),
            pull_request_name: format!("Change {id}"),
            author_id: "a".to_string(),
            status: PullRequestStatus::Open,
            assigned_reviewers: reviewers.iter().map(|r| r.to_string()).collect(),
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_user() {
        let (store, _dir) = store().await;
        seed(&store).await;

        let user = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                tx.upsert_user(&member("b", false), "backend").await?;
                tx.get_user("b").await
            })
        })
        .await
        .unwrap()
        .expect("user exists");

        assert_eq!(user.team_name, "backend");
        assert!(!user.is_active);

        let missing = in_transaction(&store, "test", |tx| {
            Box::pin(async move { tx.get_user("nobody").await })
        })
        .await
        .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_active_users_by_team_filters_and_limits() {
        let (store, _dir) = store().await;
        seed(&store).await;

        let (all, limited) = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                let all = tx.active_users_by_team("backend", Some("a"), 0).await?;
                let limited = tx.active_users_by_team("backend", None, 1).await?;
                Ok((all, limited))
            })
        })
        .await
        .unwrap();

        let mut ids: Vec<_> = all.into_iter().map(|u| u.user_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_team_is_distinct_from_missing_team() {
        let (store, _dir) = store().await;

        let (empty, missing) = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                assert!(tx.create_team("empty").await?);
                assert!(!tx.create_team("empty").await?);
                Ok((tx.get_team("empty").await?, tx.get_team("missing").await?))
            })
        })
        .await
        .unwrap();

        assert_eq!(empty.expect("team exists").members, vec![]);
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_pull_request_round_trip() {
        let (store, _dir) = store().await;
        seed(&store).await;
        let pr = open_pr("pr-1", &["b", "c"]);

        let expected = pr.clone();
        let loaded = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                tx.create_pull_request(&pr).await?;
                tx.get_pull_request("pr-1").await
            })
        })
        .await
        .unwrap()
        .expect("pull request exists");

        assert_eq!(loaded, expected);
    }

    #[tokio::test]
    async fn test_merge_is_conditional() {
        let (store, _dir) = store().await;
        seed(&store).await;
        let pr = open_pr("pr-1", &["b"]);

        let (first, second, missing, merged) = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                tx.create_pull_request(&pr).await?;
                let first = tx.merge_pull_request("pr-1", Utc::now()).await?;
                let second = tx.merge_pull_request("pr-1", Utc::now()).await?;
                let missing = tx.merge_pull_request("nope", Utc::now()).await?;
                Ok((first, second, missing, tx.get_pull_request("pr-1").await?))
            })
        })
        .await
        .unwrap();

        assert!(first);
        assert!(!second);
        assert!(!missing);
        let merged = merged.unwrap();
        assert_eq!(merged.status, PullRequestStatus::Merged);
        assert!(merged.merged_at.is_some());
    }

    #[tokio::test]
    async fn test_reviewer_links_are_idempotent() {
        let (store, _dir) = store().await;
        seed(&store).await;
        let pr = open_pr("pr-1", &["b"]);

        let (removed_twice, listed) = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                tx.create_pull_request(&pr).await?;
                tx.add_reviewer("pr-1", "b").await?;
                tx.add_reviewer("pr-1", "c").await?;
                let first = tx.remove_reviewer("pr-1", "b").await?;
                let second = tx.remove_reviewer("pr-1", "b").await?;
                Ok(((first, second), tx.pull_requests_by_reviewer("c").await?))
            })
        })
        .await
        .unwrap();

        assert_eq!(removed_twice, (true, false));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pull_request_id, "pr-1");
        assert_eq!(listed[0].status, PullRequestStatus::Open);
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_pull_request() {
        let (store, _dir) = store().await;
        seed(&store).await;
        let pr = open_pr("pr-1", &["b", "c"]);

        let result: Result<(), AppError> = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                tx.create_pull_request(&pr).await?;
                Err(AppError::Internal("fault after insert".to_string()))
            })
        })
        .await;
        assert!(result.is_err());

        let (loaded, listed) = in_transaction(&store, "test", |tx| {
            Box::pin(async move {
                Ok((
                    tx.get_pull_request("pr-1").await?,
                    tx.pull_requests_by_reviewer("b").await?,
                ))
            })
        })
        .await
        .unwrap();
        assert!(loaded.is_none());
        assert!(listed.is_empty());
    }
}
