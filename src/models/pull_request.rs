//! Pull request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Lifecycle state of a pull request.
///
/// `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl From<&str> for PrStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => Self::Merged,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// A pull request with its assigned reviewers.
///
/// Reviewers are user snapshots taken when the record was read. They are
/// references by ID, so activity and team must be re-resolved from the store
/// before any new reviewer set is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Caller-supplied unique ID.
    pub id: String,

    pub name: String,

    /// Author snapshot, immutable after creation.
    pub author: User,

    /// Assigned reviewers (never contains the author, no duplicates).
    pub reviewers: Vec<User>,

    pub status: PrStatus,

    /// Cached flag: fewer active reviewers than the staffing target.
    pub need_more_reviewers: bool,

    pub created_at: DateTime<Utc>,

    /// Present iff `status` is `Merged`.
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Create an open pull request with no reviewers.
    pub fn open(id: impl Into<String>, name: impl Into<String>, author: User) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author,
            reviewers: Vec::new(),
            status: PrStatus::Open,
            need_more_reviewers: true,
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PrStatus::Open
    }

    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }

    /// Check if the user is currently assigned as a reviewer.
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.reviewers.iter().any(|r| r.id == user_id)
    }

    pub fn reviewer_ids(&self) -> Vec<&str> {
        self.reviewers.iter().map(|r| r.id.as_str()).collect()
    }

    /// Assign a reviewer.
    ///
    /// Returns `false` (and changes nothing) for the author or a user who is
    /// already assigned.
    pub fn add_reviewer(&mut self, user: User) -> bool {
        if user.id == self.author.id || self.has_reviewer(&user.id) {
            return false;
        }
        self.reviewers.push(user);
        true
    }

    /// Unassign a reviewer. Returns whether anything was removed.
    pub fn remove_reviewer(&mut self, user_id: &str) -> bool {
        let before = self.reviewers.len();
        self.reviewers.retain(|r| r.id != user_id);
        self.reviewers.len() != before
    }

    /// Drop duplicate reviewer entries and the author, keeping first occurrences.
    pub fn dedup_reviewers(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let author_id = self.author.id.clone();
        self.reviewers
            .retain(|r| r.id != author_id && seen.insert(r.id.clone()));
    }

    /// Transition to `Merged`, stamping `merged_at`.
    pub fn mark_merged(&mut self, at: DateTime<Utc>) {
        self.status = PrStatus::Merged;
        self.merged_at = Some(at);
    }
}
