//! REST API module.
//!
//! One handler per network action. Handlers validate input, call a service
//! and wrap the result; all failures go out through `AppError`'s envelope.

mod extract;
mod pull_requests;
mod teams;
mod users;

pub use extract::*;
pub use pull_requests::*;
pub use teams::*;
pub use users::*;

use crate::errors::AppError;

/// Response type for handlers.
pub type ApiResult<T> = Result<T, AppError>;

/// Reject blank identifiers before they reach a service.
pub fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}
