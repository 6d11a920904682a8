//! Domain services.
//!
//! Each public operation opens exactly one transaction, runs its reads and
//! writes through the storage port, and commits only on success.

pub mod selection;

mod pull_requests;
mod teams;
mod users;

pub use pull_requests::PullRequestService;
pub use teams::TeamService;
pub use users::UserService;
