//! In-memory implementation of the storage port, used by the service tests.
//!
//! A transaction holds the store's lock for its whole lifetime and works on a
//! copy of the data; commit writes the copy back, drop discards it. Results
//! come back in id order so tests are deterministic.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{PullRequestRepository, Store, StoreTx, TeamRepository, UserRepository};
use crate::errors::AppError;
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus, Team, TeamMember, User};

#[derive(Debug, Clone, Default)]
struct Tables {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    pull_requests: BTreeMap<String, PullRequest>,
    /// (pull_request_id, user_id)
    reviewers: BTreeSet<(String, String)>,
}

/// In-memory store.
///
/// Transactions are fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_ops: Arc<std::sync::Mutex<HashSet<&'static str>>>,
    dropped_ops: Arc<std::sync::Mutex<HashSet<&'static str>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of the named gateway operation fail with a
    /// database error.
    pub fn fail_on(&self, op: &'static str) {
        self.failing_ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }

    /// Make every later call of the named write report success without
    /// changing anything, as if another writer had undone it.
    pub fn drop_writes_to(&self, op: &'static str) {
        self.dropped_ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            failing_ops: self.failing_ops.clone(),
            dropped_ops: self.dropped_ops.clone(),
        }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    failing_ops: Arc<std::sync::Mutex<HashSet<&'static str>>>,
    dropped_ops: Arc<std::sync::Mutex<HashSet<&'static str>>>,
}

impl InMemoryTx {
    fn check(&self, op: &'static str) -> Result<(), AppError> {
        let failing = self.failing_ops.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(op) {
            return Err(AppError::Database(format!("injected failure in {op}")));
        }
        Ok(())
    }

    fn dropped(&self, op: &'static str) -> bool {
        self.dropped_ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(op)
    }

    fn reviewers_of(&self, pull_request_id: &str) -> Vec<String> {
        self.working
            .reviewers
            .iter()
            .filter(|(pr, _)| pr == pull_request_id)
            .map(|(_, user)| user.clone())
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryTx {
    async fn upsert_user(&mut self, member: &TeamMember, team_name: &str) -> Result<(), AppError> {
        self.check("upsert_user")?;
        self.working.users.insert(
            member.user_id.clone(),
            User {
                user_id: member.user_id.clone(),
                username: member.username.clone(),
                team_name: team_name.to_string(),
                is_active: member.is_active,
            },
        );
        Ok(())
    }

    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError> {
        self.check("get_user")?;
        Ok(self.working.users.get(user_id).cloned())
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<(), AppError> {
        self.check("set_user_active")?;
        if let Some(user) = self.working.users.get_mut(user_id) {
            user.is_active = is_active;
        }
        Ok(())
    }

    async fn active_users_by_team(
        &mut self,
        team_name: &str,
        exclude_user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<User>, AppError> {
        self.check("active_users_by_team")?;
        let users = self
            .working
            .users
            .values()
            .filter(|u| u.team_name == team_name && u.is_active)
            .filter(|u| Some(u.user_id.as_str()) != exclude_user_id)
            .cloned();
        Ok(if limit == 0 {
            users.collect()
        } else {
            users.take(limit).collect()
        })
    }

    async fn team_of_user(&mut self, user_id: &str) -> Result<Option<String>, AppError> {
        self.check("team_of_user")?;
        Ok(self.working.users.get(user_id).map(|u| u.team_name.clone()))
    }
}

#[async_trait]
impl TeamRepository for InMemoryTx {
    async fn create_team(&mut self, team_name: &str) -> Result<bool, AppError> {
        self.check("create_team")?;
        Ok(self.working.teams.insert(team_name.to_string()))
    }

    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError> {
        self.check("get_team")?;
        if !self.working.teams.contains(team_name) {
            return Ok(None);
        }
        let members = self
            .working
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .cloned()
            .map(TeamMember::from)
            .collect();
        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }
}

#[async_trait]
impl PullRequestRepository for InMemoryTx {
    async fn create_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError> {
        self.check("create_pull_request")?;
        if self.working.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(AppError::Database(format!(
                "UNIQUE constraint failed: pull_requests.pull_request_id ({})",
                pr.pull_request_id
            )));
        }
        let mut row = pr.clone();
        row.assigned_reviewers.clear();
        self.working
            .pull_requests
            .insert(pr.pull_request_id.clone(), row);
        for reviewer in &pr.assigned_reviewers {
            self.add_reviewer(&pr.pull_request_id, reviewer).await?;
        }
        Ok(())
    }

    async fn get_pull_request(
        &mut self,
        pull_request_id: &str,
    ) -> Result<Option<PullRequest>, AppError> {
        self.check("get_pull_request")?;
        let Some(row) = self.working.pull_requests.get(pull_request_id).cloned() else {
            return Ok(None);
        };
        Ok(Some(PullRequest {
            assigned_reviewers: self.reviewers_of(pull_request_id),
            ..row
        }))
    }

    async fn lock_pull_request(&mut self, pull_request_id: &str) -> Result<bool, AppError> {
        self.check("lock_pull_request")?;
        Ok(self.working.pull_requests.contains_key(pull_request_id))
    }

    async fn merge_pull_request(
        &mut self,
        pull_request_id: &str,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.check("merge_pull_request")?;
        match self.working.pull_requests.get_mut(pull_request_id) {
            Some(pr) if pr.status == PullRequestStatus::Open => {
                pr.status = PullRequestStatus::Merged;
                pr.merged_at = Some(merged_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_reviewer(&mut self, pull_request_id: &str, user_id: &str) -> Result<(), AppError> {
        self.check("add_reviewer")?;
        if self.dropped("add_reviewer") {
            return Ok(());
        }
        self.working
            .reviewers
            .insert((pull_request_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn remove_reviewer(
        &mut self,
        pull_request_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        self.check("remove_reviewer")?;
        if self.dropped("remove_reviewer") {
            return Ok(false);
        }
        Ok(self
            .working
            .reviewers
            .remove(&(pull_request_id.to_string(), user_id.to_string())))
    }

    async fn pull_requests_by_reviewer(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        self.check("pull_requests_by_reviewer")?;
        Ok(self
            .working
            .reviewers
            .iter()
            .filter(|(_, reviewer)| reviewer == user_id)
            .filter_map(|(pr, _)| self.working.pull_requests.get(pr))
            .map(PullRequestShort::from)
            .collect())
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.check("commit")?;
        let InMemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
