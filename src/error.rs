//! Application error types for the assignment engine.
//!
//! Business outcomes (missing records, conflicts, invalid state, no candidate)
//! are typed variants so callers can react to them. Storage failures are
//! wrapped with the operation and record ID that triggered them.

use serde::Serialize;
use thiserror::Error;

use crate::services::store::StoreError;

/// Coarse error taxonomy used for reporting and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    NoCandidate,
    InvalidInput,
    Unauthorized,
    Upstream,
    PartialFailure,
    Cancelled,
}

/// Application-level errors returned from the assignment use cases.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested resource not found.
    #[error("Not found: {resource} {id}")]
    NotFound { resource: &'static str, id: String },

    /// A team with this name already exists.
    #[error("Team already exists: {name}")]
    TeamAlreadyExists { name: String },

    /// A pull request with this ID already exists.
    #[error("Pull request already exists: {id}")]
    PrAlreadyExists { id: String },

    /// The author of a new pull request, or their team, cannot be resolved.
    #[error("Author or team not found for author {author_id}")]
    AuthorOrTeamNotFound { author_id: String },

    /// The pull request is merged and can no longer change.
    #[error("Pull request is merged: {id}")]
    PrMerged { id: String },

    /// Merge refused.
    #[error("Unable to merge pull request {pr_id}: {reason}")]
    UnableToMerge { pr_id: String, reason: String },

    /// The reviewer to replace is not assigned to the pull request.
    #[error("Reviewer {reviewer_id} is not assigned to pull request {pr_id}")]
    ReviewerNotAssigned { pr_id: String, reviewer_id: String },

    /// Nobody is eligible to take over the reviewer slot.
    #[error("No candidate to replace reviewer {reviewer_id} on pull request {pr_id}")]
    NoCandidate { pr_id: String, reviewer_id: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// The caller is not allowed to perform the operation.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Storage failure, with the operation and ID that triggered it.
    #[error("Storage failure in {operation} ({id}): {source}")]
    Upstream {
        operation: &'static str,
        id: String,
        #[source]
        source: StoreError,
    },

    /// Bulk rebalance finished with per-pull-request failures.
    #[error("{0}")]
    Rebalance(RebalanceFailure),

    /// The caller cancelled the operation before it started.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Outcome of a bulk rebalance that did not fully succeed.
///
/// Updates listed in `updated` were committed and are not rolled back.
#[derive(Debug)]
pub struct RebalanceFailure {
    pub user_id: String,
    /// Pull requests whose replacement was committed.
    pub updated: Vec<String>,
    /// Per-pull-request failures, keyed by pull request ID.
    pub failures: Vec<(String, AppError)>,
    /// Failure of the final unassign-everywhere step, if any.
    pub cleanup_error: Option<Box<AppError>>,
}

impl std::fmt::Display for RebalanceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rebalance for user {} partially failed: {} of {} pull requests failed",
            self.user_id,
            self.failures.len(),
            self.failures.len() + self.updated.len()
        )?;
        if let Some(err) = &self.cleanup_error {
            write!(f, ", reviewer cleanup failed: {}", err)?;
        }
        for (pr_id, err) in &self.failures {
            write!(f, "; {}: {}", pr_id, err)?;
        }
        Ok(())
    }
}

impl AppError {
    /// Create a not found error.
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn unable_to_merge(pr_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnableToMerge {
            pr_id: pr_id.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a storage error with the failing operation and record ID.
    pub fn upstream(operation: &'static str, id: impl Into<String>, source: StoreError) -> Self {
        Self::Upstream {
            operation,
            id: id.into(),
            source,
        }
    }

    /// Wrap a storage error, turning `NotFound` into a typed business error.
    pub fn from_store(
        operation: &'static str,
        resource: &'static str,
        id: impl Into<String>,
        source: StoreError,
    ) -> Self {
        let id = id.into();
        if source.is_not_found() {
            Self::not_found(resource, id)
        } else {
            Self::upstream(operation, id, source)
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::AuthorOrTeamNotFound { .. } => ErrorKind::NotFound,
            Self::TeamAlreadyExists { .. } | Self::PrAlreadyExists { .. } | Self::PrMerged { .. } => {
                ErrorKind::Conflict
            }
            Self::UnableToMerge { .. } | Self::ReviewerNotAssigned { .. } => {
                ErrorKind::InvalidState
            }
            Self::NoCandidate { .. } => ErrorKind::NoCandidate,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Upstream { .. } | Self::Internal { .. } => ErrorKind::Upstream,
            Self::Rebalance(_) => ErrorKind::PartialFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Check if this is a business outcome rather than an infrastructure failure.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Upstream | ErrorKind::PartialFailure | ErrorKind::Cancelled
        )
    }
}
