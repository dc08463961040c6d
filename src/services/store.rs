//! Persistence port for the assignment engine.
//!
//! `ReviewStore` abstracts every read and write the engine performs.
//! Backends (in-memory, SQLite) must serialise writes to the same record;
//! writes to different pull requests may run in parallel.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PullRequest, ReviewStats, Team, TeamId, User};

/// Errors reported by a `ReviewStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// SQL backend failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other backend failure.
    #[error("Storage error during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Storage operations consumed by the assignment engine.
///
/// Pull requests returned from any method carry author and reviewer
/// snapshots hydrated from the users table at read time.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn get_team_by_name(&self, name: &str) -> Result<Team, StoreError>;

    async fn get_team(&self, id: TeamId) -> Result<Team, StoreError>;

    async fn get_user(&self, id: &str) -> Result<User, StoreError>;

    /// Get a user together with the name of their team (if any).
    async fn get_user_with_team(&self, id: &str) -> Result<(User, Option<String>), StoreError>;

    /// Overwrite name, activity and team of an existing user.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Create a team and upsert its members (moving them from any previous team).
    ///
    /// Fails with `AlreadyExists` if the name is taken.
    async fn add_team(&self, name: &str, members: &[User]) -> Result<Team, StoreError>;

    async fn get_pr(&self, id: &str) -> Result<PullRequest, StoreError>;

    /// Insert a new pull request. Fails with `AlreadyExists` if the ID is taken.
    async fn add_pr(&self, pr: &PullRequest) -> Result<(), StoreError>;

    /// Replace the full state of a pull request in one atomic write.
    async fn update_pr(&self, id: &str, pr: &PullRequest) -> Result<(), StoreError>;

    /// Pull requests where the user is a reviewer.
    async fn get_user_prs(&self, user_id: &str, only_open: bool)
        -> Result<Vec<PullRequest>, StoreError>;

    /// Pull requests authored or reviewed by members of the team, newest first.
    async fn get_team_prs(&self, team_id: TeamId) -> Result<Vec<PullRequest>, StoreError>;

    /// Unassign the user from every open pull request.
    ///
    /// Affected pull requests are flagged as needing more reviewers.
    /// Idempotent. Returns the IDs of the pull requests that changed.
    async fn remove_reviewer_from_all_open_prs(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Assign a single reviewer without touching the rest of the record.
    /// Assigning an existing reviewer is a no-op.
    async fn add_reviewer_to_pr(&self, pr_id: &str, user_id: &str) -> Result<(), StoreError>;

    async fn review_stats(&self) -> Result<ReviewStats, StoreError>;
}
