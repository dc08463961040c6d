//! Data models for the reviewer assignment engine.
//!
//! These models represent the core entities stored by every `ReviewStore`
//! backend and returned from the assignment use cases.

pub mod pull_request;
pub mod stats;
pub mod team;
pub mod user;

/// Team identifier assigned by the store.
pub type TeamId = i64;

// Re-exports for convenient access
pub use pull_request::{PrStatus, PullRequest};
pub use stats::ReviewStats;
pub use team::Team;
pub use user::User;
