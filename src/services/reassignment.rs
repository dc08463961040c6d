//! Reviewer reassignment.
//!
//! Moves reviewer slots when a reviewer leaves a pull request, either because
//! an admin asked for it or because the reviewer became unavailable. Bulk
//! rebalance fans out one task per affected pull request and waits for all of
//! them before the final cleanup.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::selection::SelectionPolicy;
use super::store::ReviewStore;
use crate::error::{AppError, RebalanceFailure};
use crate::models::{PullRequest, TeamId, User};

/// What caused a reviewer to leave a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassignTrigger {
    /// Admin request. Missing team or candidate is an error.
    Explicit,
    /// Reviewer deactivated or moved. Degrades to "needs more reviewers".
    Availability,
}

/// Result of a single-PR reassignment.
#[derive(Debug, Clone)]
pub struct ReassignOutcome {
    pub pull_request: PullRequest,
    /// ID of the new reviewer, if one was found.
    pub replaced_by: Option<String>,
}

/// Summary of a fully successful bulk rebalance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub user_id: String,
    /// Pull requests whose reviewer set was rewritten.
    pub updated: Vec<String>,
    /// Pull requests that were merged or no longer had the user by the time
    /// their task ran.
    pub skipped: Vec<String>,
    /// Pull requests the final cleanup still had to unassign the user from.
    pub cleaned: Vec<String>,
}

/// Count reviewers that are active members of `team_id`.
///
/// Reviewers are expected to be freshly read; a reviewer who moved to another
/// team no longer staffs the pull request.
pub fn count_staffing(reviewers: &[User], team_id: Option<TeamId>) -> usize {
    let Some(team_id) = team_id else {
        return 0;
    };
    reviewers
        .iter()
        .filter(|u| u.is_active && u.team_id == Some(team_id))
        .count()
}

/// Coordinates reviewer replacement on one or many pull requests.
#[derive(Clone)]
pub struct ReassignmentCoordinator {
    store: Arc<dyn ReviewStore>,
    policy: SelectionPolicy,
}

impl ReassignmentCoordinator {
    pub fn new(store: Arc<dyn ReviewStore>, policy: SelectionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Replace `departing_id` on one pull request and persist the new state.
    ///
    /// The pull request is re-read before anything is computed, so callers may
    /// pass IDs taken from stale listings.
    pub async fn reassign(
        &self,
        pr_id: &str,
        departing_id: &str,
        trigger: ReassignTrigger,
    ) -> Result<ReassignOutcome, AppError> {
        self.reassign_excluding(pr_id, departing_id, trigger, &HashSet::new())
            .await
    }

    /// `reassign`, never picking anyone in `excluded` as the replacement.
    pub async fn reassign_excluding(
        &self,
        pr_id: &str,
        departing_id: &str,
        trigger: ReassignTrigger,
        excluded: &HashSet<String>,
    ) -> Result<ReassignOutcome, AppError> {
        let mut pr = self
            .store
            .get_pr(pr_id)
            .await
            .map_err(|e| AppError::from_store("get_pr", "pull request", pr_id, e))?;

        if pr.is_merged() {
            return Err(AppError::PrMerged { id: pr.id });
        }
        if !pr.has_reviewer(departing_id) {
            return Err(AppError::ReviewerNotAssigned {
                pr_id: pr.id,
                reviewer_id: departing_id.to_string(),
            });
        }

        let (team_id, roster) = self.author_roster(&pr, trigger).await?;
        let replacement = {
            let mut exclude: HashSet<&str> = pr.reviewer_ids().into_iter().collect();
            exclude.insert(pr.author.id.as_str());
            exclude.insert(departing_id);
            exclude.extend(excluded.iter().map(String::as_str));
            self.policy.replacement(&exclude, &roster)
        };

        if replacement.is_none() && trigger == ReassignTrigger::Explicit {
            return Err(AppError::NoCandidate {
                pr_id: pr.id,
                reviewer_id: departing_id.to_string(),
            });
        }

        pr.remove_reviewer(departing_id);
        if let Some(user) = &replacement {
            pr.add_reviewer(user.clone());
        }
        pr.dedup_reviewers();
        pr.reviewers = self.refresh_users(&pr.reviewers).await?;
        pr.need_more_reviewers = replacement.is_none()
            || self
                .policy
                .needs_more(count_staffing(&pr.reviewers, team_id));

        self.store
            .update_pr(&pr.id, &pr)
            .await
            .map_err(|e| AppError::from_store("update_pr", "pull request", pr.id.as_str(), e))?;

        let replaced_by = replacement.map(|u| u.id);
        match &replaced_by {
            Some(new_id) => log::info!(
                "[reassign] {}: {} -> {} ({:?})",
                pr.id,
                departing_id,
                new_id,
                trigger
            ),
            None => log::info!(
                "[reassign] {}: removed {}, no candidate, needs more reviewers",
                pr.id,
                departing_id
            ),
        }

        Ok(ReassignOutcome {
            pull_request: pr,
            replaced_by,
        })
    }

    /// Move every open review held by `user_id` to someone else.
    ///
    /// One task per pull request runs concurrently; the call returns only after
    /// all of them finished. The user is then unassigned from every open pull
    /// request regardless of individual outcomes. Committed updates are kept
    /// when other tasks fail; the failures are reported together.
    pub async fn rebalance_user(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RebalanceReport, AppError> {
        self.rebalance_user_excluding(user_id, &HashSet::new(), cancel)
            .await
    }

    /// `rebalance_user`, never handing a review to anyone in `excluded`.
    ///
    /// Used when several users leave at once so they cannot replace each other.
    pub async fn rebalance_user_excluding(
        &self,
        user_id: &str,
        excluded: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> Result<RebalanceReport, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let prs = self
            .store
            .get_user_prs(user_id, true)
            .await
            .map_err(|e| AppError::upstream("get_user_prs", user_id, e))?;

        log::info!(
            "[rebalance] Reassigning {} open pull requests from {}",
            prs.len(),
            user_id
        );

        let excluded = Arc::new(excluded.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pr_ids = Vec::with_capacity(prs.len());
        let mut handles = Vec::with_capacity(prs.len());

        for pr in prs {
            let coordinator = self.clone();
            let token = cancel.child_token();
            let departing = user_id.to_string();
            let excluded = Arc::clone(&excluded);
            let pr_id = pr.id;
            let tx = tx.clone();

            pr_ids.push(pr_id.clone());
            handles.push(tokio::spawn(async move {
                let result = if token.is_cancelled() {
                    Err(AppError::Cancelled)
                } else {
                    coordinator
                        .reassign_excluding(
                            &pr_id,
                            &departing,
                            ReassignTrigger::Availability,
                            &excluded,
                        )
                        .await
                };
                let _ = tx.send((pr_id, result));
            }));
        }
        drop(tx);

        let mut report = RebalanceReport {
            user_id: user_id.to_string(),
            ..Default::default()
        };
        let mut failures: Vec<(String, AppError)> = Vec::new();

        for (pr_id, joined) in pr_ids.into_iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                failures.push((pr_id, AppError::internal(format!("reassign task failed: {}", e))));
            }
        }

        while let Ok((pr_id, result)) = rx.try_recv() {
            match result {
                Ok(_) => report.updated.push(pr_id),
                Err(AppError::PrMerged { .. } | AppError::ReviewerNotAssigned { .. }) => {
                    report.skipped.push(pr_id)
                }
                Err(e) => {
                    log::warn!("[rebalance] {} failed for {}: {}", pr_id, user_id, e);
                    failures.push((pr_id, e));
                }
            }
        }

        let cleanup_error = match self.store.remove_reviewer_from_all_open_prs(user_id).await {
            Ok(ids) => {
                report.cleaned = ids;
                None
            }
            Err(e) => {
                log::error!("[rebalance] Cleanup failed for {}: {}", user_id, e);
                Some(Box::new(AppError::upstream(
                    "remove_reviewer_from_all_open_prs",
                    user_id,
                    e,
                )))
            }
        };

        report.updated.sort();
        report.skipped.sort();
        failures.sort_by(|a, b| a.0.cmp(&b.0));

        if failures.is_empty() && cleanup_error.is_none() {
            log::info!(
                "[rebalance] {} done: {} updated, {} skipped",
                user_id,
                report.updated.len(),
                report.skipped.len()
            );
            return Ok(report);
        }

        Err(AppError::Rebalance(RebalanceFailure {
            user_id: report.user_id,
            updated: report.updated,
            failures,
            cleanup_error,
        }))
    }

    /// Offer a reactivated user to understaffed pull requests of their team.
    ///
    /// Returns the IDs of the pull requests the user was added to.
    pub async fn backfill_after_activation(&self, user: &User) -> Result<Vec<String>, AppError> {
        let Some(team_id) = user.team_id else {
            return Ok(Vec::new());
        };
        let team_members = self.team_member_ids(team_id).await?;
        let prs = self
            .store
            .get_team_prs(team_id)
            .await
            .map_err(|e| AppError::upstream("get_team_prs", team_id.to_string(), e))?;

        let mut filled = Vec::new();
        for mut pr in prs {
            if !pr.is_open()
                || !pr.need_more_reviewers
                || !team_members.contains(pr.author.id.as_str())
                || pr.author.id == user.id
                || pr.has_reviewer(&user.id)
                || pr.reviewers.len() >= self.policy.max_reviewers()
            {
                continue;
            }

            pr.add_reviewer(user.clone());
            let reviewers = self.refresh_users(&pr.reviewers).await?;
            let need_more = self
                .policy
                .needs_more(count_staffing(&reviewers, Some(team_id)));

            if need_more == pr.need_more_reviewers {
                self.store
                    .add_reviewer_to_pr(&pr.id, &user.id)
                    .await
                    .map_err(|e| AppError::upstream("add_reviewer_to_pr", pr.id.as_str(), e))?;
            } else {
                pr.reviewers = reviewers;
                pr.need_more_reviewers = need_more;
                self.store
                    .update_pr(&pr.id, &pr)
                    .await
                    .map_err(|e| AppError::upstream("update_pr", pr.id.as_str(), e))?;
            }

            log::info!("[backfill] Added {} to {}", user.id, pr.id);
            filled.push(pr.id);
        }

        Ok(filled)
    }

    /// Re-staff every understaffed open pull request authored in the team.
    ///
    /// Run after the roster changes so that pull requests created while the
    /// team was too small pick up new members.
    pub async fn refill_team(&self, team_id: TeamId) -> Result<Vec<String>, AppError> {
        let team = self
            .store
            .get_team(team_id)
            .await
            .map_err(|e| AppError::from_store("get_team", "team", team_id.to_string(), e))?;
        let prs = self
            .store
            .get_team_prs(team_id)
            .await
            .map_err(|e| AppError::upstream("get_team_prs", team_id.to_string(), e))?;

        let mut refilled = Vec::new();
        for mut pr in prs {
            if !pr.is_open() || !pr.need_more_reviewers || !team.has_member(&pr.author.id) {
                continue;
            }

            let mut reviewers = self.refresh_users(&pr.reviewers).await?;
            let mut added = false;
            while reviewers.len() < self.policy.max_reviewers() {
                let pick = {
                    let mut exclude: HashSet<&str> =
                        reviewers.iter().map(|r| r.id.as_str()).collect();
                    exclude.insert(pr.author.id.as_str());
                    self.policy.replacement(&exclude, &team.members)
                };
                match pick {
                    Some(user) => {
                        reviewers.push(user);
                        added = true;
                    }
                    None => break,
                }
            }

            let need_more = self
                .policy
                .needs_more(count_staffing(&reviewers, Some(team.id)));
            if !added && need_more == pr.need_more_reviewers {
                continue;
            }

            pr.reviewers = reviewers;
            pr.need_more_reviewers = need_more;
            pr.dedup_reviewers();
            self.store
                .update_pr(&pr.id, &pr)
                .await
                .map_err(|e| AppError::upstream("update_pr", pr.id.as_str(), e))?;

            log::info!(
                "[refill] {} now has {} reviewers (needs more: {})",
                pr.id,
                pr.reviewers.len(),
                pr.need_more_reviewers
            );
            refilled.push(pr.id);
        }

        Ok(refilled)
    }

    /// The author's current team ID and its members.
    async fn author_roster(
        &self,
        pr: &PullRequest,
        trigger: ReassignTrigger,
    ) -> Result<(Option<TeamId>, Vec<User>), AppError> {
        let missing = || match trigger {
            ReassignTrigger::Explicit => Err(AppError::AuthorOrTeamNotFound {
                author_id: pr.author.id.clone(),
            }),
            ReassignTrigger::Availability => Ok((None, Vec::new())),
        };

        let author = match self.store.get_user(&pr.author.id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return missing(),
            Err(e) => return Err(AppError::upstream("get_user", pr.author.id.as_str(), e)),
        };
        let Some(team_id) = author.team_id else {
            return missing();
        };

        match self.store.get_team(team_id).await {
            Ok(team) => Ok((Some(team.id), team.members)),
            Err(e) if e.is_not_found() => missing(),
            Err(e) => Err(AppError::upstream("get_team", team_id.to_string(), e)),
        }
    }

    async fn team_member_ids(&self, team_id: TeamId) -> Result<HashSet<String>, AppError> {
        let team = self
            .store
            .get_team(team_id)
            .await
            .map_err(|e| AppError::from_store("get_team", "team", team_id.to_string(), e))?;
        Ok(team.members.into_iter().map(|u| u.id).collect())
    }

    /// Re-read each user so activity and team reflect the store right now.
    ///
    /// Users that no longer exist are kept but counted as inactive.
    async fn refresh_users(&self, users: &[User]) -> Result<Vec<User>, AppError> {
        let mut fresh = Vec::with_capacity(users.len());
        for user in users {
            match self.store.get_user(&user.id).await {
                Ok(current) => fresh.push(current),
                Err(e) if e.is_not_found() => fresh.push(User {
                    is_active: false,
                    ..user.clone()
                }),
                Err(e) => return Err(AppError::upstream("get_user", user.id.as_str(), e)),
            }
        }
        Ok(fresh)
    }
}

impl std::fmt::Debug for ReassignmentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReassignmentCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
