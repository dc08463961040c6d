//! Reviewer selection policy.
//!
//! Pure functions that pick reviewer candidates from a team roster. Selection
//! is uniformly random and memoryless. The random source is injected so tests
//! can make picks deterministic without touching process-wide state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use crate::models::User;

/// Default number of reviewers per pull request.
pub const DEFAULT_MAX_REVIEWERS: usize = 2;

/// Random source shared by every clone of a `SelectionPolicy`.
pub type SharedRng = Arc<Mutex<dyn RngCore + Send>>;

/// Wrap any RNG as a shared random source.
pub fn shared_rng<R: RngCore + Send + 'static>(rng: R) -> SharedRng {
    Arc::new(Mutex::new(rng))
}

/// Result of picking reviewers for a new pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSelection {
    pub reviewers: Vec<User>,
    pub need_more_reviewers: bool,
}

/// Active roster members whose IDs are not excluded.
pub fn eligible_candidates<'a>(roster: &'a [User], exclude: &HashSet<&str>) -> Vec<&'a User> {
    roster
        .iter()
        .filter(|u| u.is_active && !exclude.contains(u.id.as_str()))
        .collect()
}

/// Pick up to `max_reviewers` active teammates of the author.
///
/// Takes every eligible member when there are at most `max_reviewers` of
/// them, otherwise draws `max_reviewers` uniformly at random.
pub fn pick_initial_reviewers<R: Rng + ?Sized>(
    author_id: &str,
    roster: &[User],
    max_reviewers: usize,
    rng: &mut R,
) -> InitialSelection {
    let exclude = HashSet::from([author_id]);
    let eligible = eligible_candidates(roster, &exclude);

    let reviewers: Vec<User> = if eligible.len() <= max_reviewers {
        eligible.into_iter().cloned().collect()
    } else {
        eligible
            .choose_multiple(rng, max_reviewers)
            .map(|u| (*u).clone())
            .collect()
    };

    InitialSelection {
        need_more_reviewers: reviewers.len() < max_reviewers,
        reviewers,
    }
}

/// Pick one active roster member outside `exclude`, uniformly at random.
pub fn pick_replacement<R: Rng + ?Sized>(
    exclude: &HashSet<&str>,
    roster: &[User],
    rng: &mut R,
) -> Option<User> {
    eligible_candidates(roster, exclude)
        .choose(rng)
        .map(|u| (*u).clone())
}

/// Selection policy bound to a reviewer quota and a random source.
///
/// `max_reviewers` is also the staffing target: a pull request with fewer
/// active reviewers than this needs more reviewers.
#[derive(Clone)]
pub struct SelectionPolicy {
    max_reviewers: usize,
    rng: SharedRng,
}

impl SelectionPolicy {
    pub fn new(max_reviewers: usize, rng: SharedRng) -> Self {
        Self { max_reviewers, rng }
    }

    /// Policy seeded from OS entropy.
    pub fn from_entropy(max_reviewers: usize) -> Self {
        Self::new(max_reviewers, shared_rng(StdRng::from_entropy()))
    }

    pub fn max_reviewers(&self) -> usize {
        self.max_reviewers
    }

    /// Whether `active_reviewers` falls short of the staffing target.
    pub fn needs_more(&self, active_reviewers: usize) -> bool {
        active_reviewers < self.max_reviewers
    }

    pub fn initial_reviewers(&self, author_id: &str, roster: &[User]) -> InitialSelection {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pick_initial_reviewers(author_id, roster, self.max_reviewers, &mut *rng)
    }

    pub fn replacement(&self, exclude: &HashSet<&str>, roster: &[User]) -> Option<User> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pick_replacement(exclude, roster, &mut *rng)
    }
}

impl std::fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPolicy")
            .field("max_reviewers", &self.max_reviewers)
            .finish_non_exhaustive()
    }
}
