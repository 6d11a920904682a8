//! Storage port.
//!
//! The services talk to storage only through these traits. Every call runs
//! inside a transaction obtained from [`Store::begin`]; the gateway never
//! begins or commits on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::errors::AppError;
use crate::models::{PullRequest, PullRequestShort, Team, TeamMember, User};

/// User reads and writes.
#[async_trait]
pub trait UserRepository: Send {
    /// Insert or replace a user's name, team and activity flag.
    async fn upsert_user(&mut self, member: &TeamMember, team_name: &str) -> Result<(), AppError>;

    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Update the activity flag. Affects nothing if the user is absent.
    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<(), AppError>;

    /// Active members of a team in random order, optionally excluding one
    /// user. A `limit` of zero means no limit.
    async fn active_users_by_team(
        &mut self,
        team_name: &str,
        exclude_user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<User>, AppError>;

    /// Name of the team the user currently belongs to.
    async fn team_of_user(&mut self, user_id: &str) -> Result<Option<String>, AppError>;
}

/// Team reads and writes.
#[async_trait]
pub trait TeamRepository: Send {
    /// Create the team row if absent. Returns `true` when a row was inserted.
    async fn create_team(&mut self, team_name: &str) -> Result<bool, AppError>;

    /// The team and its roster, or `None` when no team row exists.
    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError>;
}

/// Pull request and reviewer link reads and writes.
#[async_trait]
pub trait PullRequestRepository: Send {
    /// Insert the pull request row and one reviewer link per assigned reviewer.
    async fn create_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError>;

    async fn get_pull_request(&mut self, pull_request_id: &str)
        -> Result<Option<PullRequest>, AppError>;

    /// Take the write lock on a pull request row for the rest of the
    /// transaction. Returns `false` when the pull request does not exist.
    async fn lock_pull_request(&mut self, pull_request_id: &str) -> Result<bool, AppError>;

    /// Set status to merged only if it is currently open. Returns `true` when
    /// a row changed.
    async fn merge_pull_request(
        &mut self,
        pull_request_id: &str,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Link a reviewer. Linking an existing reviewer is a no-op.
    async fn add_reviewer(&mut self, pull_request_id: &str, user_id: &str) -> Result<(), AppError>;

    /// Unlink a reviewer. Returns `true` when a link was removed.
    async fn remove_reviewer(&mut self, pull_request_id: &str, user_id: &str)
        -> Result<bool, AppError>;

    async fn pull_requests_by_reviewer(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError>;
}

/// An open transaction. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: UserRepository + TeamRepository + PullRequestRepository {
    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Source of transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

/// Run `body` inside one transaction.
///
/// Commits only when `body` returns `Ok`. On `Err` the transaction is rolled
/// back before the error is returned. A panic or a cancelled future drops the
/// transaction, which rolls it back as well.
pub async fn in_transaction<T, F>(store: &dyn Store, op: &'static str, body: F) -> Result<T, AppError>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut dyn StoreTx) -> BoxFuture<'c, Result<T, AppError>> + Send,
{
    let mut tx = store.begin().await?;

    match body(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            tracing::trace!(op, "transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(op, error = %rollback_err, "failed to rollback transaction");
            }
            tracing::debug!(op, error = %err, "transaction rolled back");
            Err(err)
        }
    }
}
