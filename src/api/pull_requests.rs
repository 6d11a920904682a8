//! Pull request API endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::{require, ApiJson, ApiQuery, ApiResult};
use crate::models::{
    CreatePullRequestRequest, MergePullRequestRequest, PullRequest, PullRequestIdQuery,
    ReassignReviewerRequest, Reassignment,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequest,
}

/// POST /pullRequest/create - Create a pull request and assign reviewers.
pub async fn create_pull_request(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreatePullRequestRequest>,
) -> ApiResult<(StatusCode, Json<PullRequestResponse>)> {
    require("pull_request_id", &request.pull_request_id)?;
    require("pull_request_name", &request.pull_request_name)?;
    require("author_id", &request.author_id)?;

    let pr = state.pull_requests.create(request).await?;
    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

/// POST /pullRequest/merge - Mark a pull request merged (idempotent).
pub async fn merge_pull_request(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MergePullRequestRequest>,
) -> ApiResult<Json<PullRequestResponse>> {
    require("pull_request_id", &request.pull_request_id)?;

    let pr = state.pull_requests.merge(request.pull_request_id).await?;
    Ok(Json(PullRequestResponse { pr }))
}

/// POST /pullRequest/reassign - Replace one reviewer with a teammate.
pub async fn reassign_reviewer(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReassignReviewerRequest>,
) -> ApiResult<Json<Reassignment>> {
    require("pull_request_id", &request.pull_request_id)?;
    require("old_user_id", &request.old_user_id)?;

    let reassignment = state
        .pull_requests
        .reassign(request.pull_request_id, request.old_user_id)
        .await?;
    Ok(Json(reassignment))
}

/// GET /pullRequest/get?pull_request_id= - Get a single pull request.
pub async fn get_pull_request(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PullRequestIdQuery>,
) -> ApiResult<Json<PullRequestResponse>> {
    require("pull_request_id", &query.pull_request_id)?;

    let pr = state.pull_requests.get(query.pull_request_id).await?;
    Ok(Json(PullRequestResponse { pr }))
}
