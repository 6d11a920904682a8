//! Team creation and lookup.

use std::sync::Arc;

use crate::db::{in_transaction, Store};
use crate::errors::AppError;
use crate::models::Team;

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn Store>,
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the team if it does not exist, then upsert every supplied
    /// member into it. Repeating the call converges instead of failing.
    /// Returns the stored roster.
    pub async fn create(&self, team: Team) -> Result<Team, AppError> {
        let (stored, inserted) = in_transaction(self.store.as_ref(), "teams.create", |tx| {
            Box::pin(async move {
                let inserted = tx.create_team(&team.team_name).await?;
                for member in &team.members {
                    tx.upsert_user(member, &team.team_name).await?;
                }
                let stored = tx.get_team(&team.team_name).await?.ok_or_else(|| {
                    AppError::Internal(format!("team {} missing after create", team.team_name))
                })?;
                Ok((stored, inserted))
            })
        })
        .await?;

        tracing::info!(
            team_name = %stored.team_name,
            created = inserted,
            members = stored.members.len(),
            "team saved"
        );
        Ok(stored)
    }

    pub async fn get(&self, team_name: String) -> Result<Team, AppError> {
        in_transaction(self.store.as_ref(), "teams.get", |tx| {
            Box::pin(async move {
                tx.get_team(&team_name)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("team {team_name}")))
            })
        })
        .await
    }
}
