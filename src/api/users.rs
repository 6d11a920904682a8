//! User API endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{require, ApiJson, ApiQuery, ApiResult};
use crate::models::{PullRequestShort, SetIsActiveRequest, User, UserIdQuery};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

/// POST /users/setIsActive - Toggle whether a user can be assigned reviews.
pub async fn set_is_active(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SetIsActiveRequest>,
) -> ApiResult<Json<UserResponse>> {
    require("user_id", &request.user_id)?;

    let user = state
        .users
        .set_is_active(request.user_id, request.is_active)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/getReview?user_id= - Pull requests the user is reviewing.
pub async fn get_review(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserIdQuery>,
) -> ApiResult<Json<ReviewListResponse>> {
    require("user_id", &query.user_id)?;

    let pull_requests = state
        .pull_requests
        .list_by_reviewer(query.user_id.clone())
        .await?;
    Ok(Json(ReviewListResponse {
        user_id: query.user_id,
        pull_requests,
    }))
}
