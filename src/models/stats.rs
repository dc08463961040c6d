//! Review load statistics.

use serde::Serialize;
use std::collections::BTreeMap;

/// Assignment counts across all pull requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    /// Number of pull requests each user is assigned to review.
    pub reviews_per_user: BTreeMap<String, u64>,

    /// Number of reviewers assigned to each pull request.
    pub reviewers_per_pr: BTreeMap<String, u64>,
}
