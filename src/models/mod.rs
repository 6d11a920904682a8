//! Data models for the reviewer assignment service.
//!
//! Field names serialize in snake_case to match the HTTP contract.

mod pull_request;
mod team;
mod user;

pub use pull_request::*;
pub use team::*;
pub use user::*;
