//! Team model.

use serde::{Deserialize, Serialize};

use super::TeamMember;

/// A team together with its member roster. Also the body of `POST /team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// Query parameters for `GET /team/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamNameQuery {
    pub team_name: String,
}
