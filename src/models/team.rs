//! Team model.

use serde::{Deserialize, Serialize};

use super::{TeamId, User};

/// A named group of users.
///
/// Membership is derived from each user's `team_id`; a team records who is
/// currently in it but owns nobody's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,

    /// Unique team name.
    pub name: String,

    /// Current members, in no particular order.
    pub members: Vec<User>,
}

impl Team {
    /// Check whether a user is currently a member.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id == user_id)
    }

    /// Members available for review.
    pub fn active_members(&self) -> impl Iterator<Item = &User> {
        self.members.iter().filter(|m| m.is_active)
    }
}
