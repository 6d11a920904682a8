//! Error handling module for the reviewer assignment service.
//!
//! Provides the error taxonomy shared by the storage layer and the services,
//! with mapping to HTTP status codes and the `{error: {code, message}}` envelope.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const TEAM_EXISTS: &str = "TEAM_EXISTS";
    pub const PR_MERGED: &str = "PR_MERGED";
    pub const NOT_ASSIGNED: &str = "NOT_ASSIGNED";
    pub const NO_CANDIDATE: &str = "NO_CANDIDATE";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Message sent to clients in place of internal error details.
const INTERNAL_MESSAGE: &str = "internal server error";

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced user, team or pull request does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Creation attempted for an id that already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Mutation attempted on a merged pull request
    #[error("pull request {0} is already merged")]
    PrMerged(String),
    /// Reassignment target is not a current reviewer
    #[error("reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },
    /// No eligible replacement reviewer in the departing reviewer's team
    #[error("no active replacement candidate in team {0}")]
    NoCandidate(String),
    /// Malformed input at the HTTP boundary
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Database error
    #[error("database error: {0}")]
    Database(String),
    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_)
            | AppError::PrMerged(_)
            | AppError::NotAssigned { .. }
            | AppError::NoCandidate(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::AlreadyExists(_) => codes::TEAM_EXISTS,
            AppError::PrMerged(_) => codes::PR_MERGED,
            AppError::NotAssigned { .. } => codes::NOT_ASSIGNED,
            AppError::NoCandidate(_) => codes::NO_CANDIDATE,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is a storage or runtime fault rather than a domain outcome.
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    /// Message safe to show to clients. Internal details stay in the server log.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.public_message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            tracing::error!(error = %self, "request failed with internal error");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "request rejected");
        }
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}
