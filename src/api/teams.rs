//! Team API endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::{require, ApiJson, ApiQuery, ApiResult};
use crate::models::{Team, TeamNameQuery};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team: Team,
}

/// POST /team/add - Create a team and upsert its members.
pub async fn add_team(
    State(state): State<AppState>,
    ApiJson(team): ApiJson<Team>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    require("team_name", &team.team_name)?;
    for member in &team.members {
        require("user_id", &member.user_id)?;
    }

    let team = state.teams.create(team).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name= - Get a team with its members.
pub async fn get_team(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TeamNameQuery>,
) -> ApiResult<Json<Team>> {
    require("team_name", &query.team_name)?;

    let team = state.teams.get(query.team_name).await?;
    Ok(Json(team))
}
