//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::TeamId;

/// A team member who can author pull requests and review them.
///
/// Users are never deleted; availability is toggled through `is_active`.
/// `team_id` is a back-reference: the team does not own the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Globally unique user ID.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether the user is currently available for review assignment.
    pub is_active: bool,

    /// Team the user currently belongs to.
    pub team_id: Option<TeamId>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_active: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active,
            team_id: None,
        }
    }

    /// Set the team back-reference.
    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }
}
