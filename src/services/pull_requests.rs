//! Pull request lifecycle: create with automatic reviewers, merge, reassign.
//!
//! `OPEN -> MERGED` is the only transition. Every operation runs in a single
//! transaction through [`in_transaction`].

use std::sync::Arc;

use chrono::Utc;

use super::selection::{self, RandomSource};
use crate::db::{in_transaction, Store};
use crate::errors::AppError;
use crate::models::{
    CreatePullRequestRequest, PullRequest, PullRequestShort, PullRequestStatus, Reassignment,
};

#[derive(Clone)]
pub struct PullRequestService {
    store: Arc<dyn Store>,
    rng: RandomSource,
}

impl PullRequestService {
    pub fn new(store: Arc<dyn Store>, rng: RandomSource) -> Self {
        Self { store, rng }
    }

    /// Create an open pull request and assign up to two reviewers from the
    /// author's team.
    pub async fn create(&self, request: CreatePullRequestRequest) -> Result<PullRequest, AppError> {
        let rng = self.rng.clone();

        let pr = in_transaction(self.store.as_ref(), "pull_requests.create", |tx| {
            Box::pin(async move {
                if tx.get_pull_request(&request.pull_request_id).await?.is_some() {
                    return Err(AppError::AlreadyExists(format!(
                        "pull request {}",
                        request.pull_request_id
                    )));
                }

                let author = tx.get_user(&request.author_id).await?.ok_or_else(|| {
                    AppError::NotFound(format!("author {}", request.author_id))
                })?;

                let teammates = tx
                    .active_users_by_team(&author.team_name, Some(&author.user_id), 0)
                    .await?;
                let reviewers = selection::with_rng(&rng, |rng| {
                    selection::pick_initial_reviewers(&author.user_id, &teammates, rng)
                });

                let pr = PullRequest {
                    pull_request_id: request.pull_request_id,
                    pull_request_name: request.pull_request_name,
                    author_id: author.user_id,
                    status: PullRequestStatus::Open,
                    assigned_reviewers: reviewers,
                    created_at: Utc::now(),
                    merged_at: None,
                };
                tx.create_pull_request(&pr).await?;
                Ok(pr)
            })
        })
        .await?;

        tracing::info!(
            pull_request_id = %pr.pull_request_id,
            author_id = %pr.author_id,
            reviewers = ?pr.assigned_reviewers,
            "pull request created"
        );
        Ok(pr)
    }

    /// Mark a pull request merged. Merging a merged pull request returns it
    /// unchanged.
    pub async fn merge(&self, pull_request_id: String) -> Result<PullRequest, AppError> {
        let (pr, changed) = in_transaction(self.store.as_ref(), "pull_requests.merge", |tx| {
            Box::pin(async move {
                if !tx.lock_pull_request(&pull_request_id).await? {
                    return Err(AppError::NotFound(format!("pull request {pull_request_id}")));
                }
                let current = tx
                    .get_pull_request(&pull_request_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("pull request {pull_request_id}")))?;
                if current.is_merged() {
                    return Ok((current, false));
                }

                let changed = tx.merge_pull_request(&pull_request_id, Utc::now()).await?;
                let merged = tx.get_pull_request(&pull_request_id).await?.ok_or_else(|| {
                    AppError::Internal(format!("pull request {pull_request_id} vanished during merge"))
                })?;
                Ok((merged, changed))
            })
        })
        .await?;

        if changed {
            tracing::info!(pull_request_id = %pr.pull_request_id, "pull request merged");
        } else {
            tracing::debug!(pull_request_id = %pr.pull_request_id, "pull request already merged");
        }
        Ok(pr)
    }

    /// Replace one assigned reviewer with a random eligible member of that
    /// reviewer's team. The number of reviewers does not change.
    pub async fn reassign(
        &self,
        pull_request_id: String,
        old_reviewer_id: String,
    ) -> Result<Reassignment, AppError> {
        let rng = self.rng.clone();

        let reassignment = in_transaction(self.store.as_ref(), "pull_requests.reassign", |tx| {
            Box::pin(async move {
                if !tx.lock_pull_request(&pull_request_id).await? {
                    return Err(AppError::NotFound(format!("pull request {pull_request_id}")));
                }
                let pr = tx
                    .get_pull_request(&pull_request_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("pull request {pull_request_id}")))?;

                if pr.is_merged() {
                    return Err(AppError::PrMerged(pull_request_id));
                }
                let not_assigned = || AppError::NotAssigned {
                    pull_request_id: pull_request_id.clone(),
                    reviewer_id: old_reviewer_id.clone(),
                };
                if !pr.has_reviewer(&old_reviewer_id) {
                    return Err(not_assigned());
                }

                let team_name = tx.team_of_user(&old_reviewer_id).await?.ok_or_else(|| {
                    AppError::NotFound(format!("team of user {old_reviewer_id}"))
                })?;
                let team = tx.active_users_by_team(&team_name, None, 0).await?;

                let new_reviewer_id = selection::with_rng(&rng, |rng| {
                    selection::pick_replacement(
                        &team,
                        &old_reviewer_id,
                        &pr.author_id,
                        &pr.assigned_reviewers,
                        rng,
                    )
                })
                .ok_or_else(|| AppError::NoCandidate(team_name.clone()))?;

                if !tx.remove_reviewer(&pull_request_id, &old_reviewer_id).await? {
                    return Err(not_assigned());
                }
                tx.add_reviewer(&pull_request_id, &new_reviewer_id).await?;

                let updated = tx.get_pull_request(&pull_request_id).await?.ok_or_else(|| {
                    AppError::Internal(format!("pull request {pull_request_id} vanished during reassignment"))
                })?;
                if updated.assigned_reviewers.len() != pr.assigned_reviewers.len() {
                    return Err(AppError::Internal(format!(
                        "reviewer count of {pull_request_id} changed from {} to {}",
                        pr.assigned_reviewers.len(),
                        updated.assigned_reviewers.len()
                    )));
                }

                Ok(Reassignment {
                    pr: updated,
                    replaced_by: new_reviewer_id,
                })
            })
        })
        .await?;

        tracing::info!(
            pull_request_id = %reassignment.pr.pull_request_id,
            replaced_by = %reassignment.replaced_by,
            "reviewer reassigned"
        );
        Ok(reassignment)
    }

    pub async fn get(&self, pull_request_id: String) -> Result<PullRequest, AppError> {
        in_transaction(self.store.as_ref(), "pull_requests.get", |tx| {
            Box::pin(async move {
                tx.get_pull_request(&pull_request_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("pull request {pull_request_id}")))
            })
        })
        .await
    }

    /// Pull requests the user currently reviews.
    pub async fn list_by_reviewer(&self, user_id: String) -> Result<Vec<PullRequestShort>, AppError> {
        in_transaction(self.store.as_ref(), "pull_requests.list_by_reviewer", |tx| {
            Box::pin(async move {
                if tx.get_user(&user_id).await?.is_none() {
                    return Err(AppError::NotFound(format!("user {user_id}")));
                }
                tx.pull_requests_by_reviewer(&user_id).await
            })
        })
        .await
    }
}
