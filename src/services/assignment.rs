//! Assignment engine use cases.
//!
//! `AssignmentService` is the surface the HTTP layer talks to. It owns the
//! admin identities and delegates reviewer movement to the
//! `ReassignmentCoordinator`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::reassignment::{ReassignOutcome, ReassignTrigger, ReassignmentCoordinator};
use super::selection::SelectionPolicy;
use super::store::ReviewStore;
use crate::error::{AppError, RebalanceFailure};
use crate::models::{PullRequest, ReviewStats, Team, User};

/// Assignment engine facade.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn ReviewStore>,
    coordinator: ReassignmentCoordinator,
    admin_ids: Arc<HashSet<String>>,
}

impl AssignmentService {
    pub fn new<I, S>(store: Arc<dyn ReviewStore>, policy: SelectionPolicy, admin_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            coordinator: ReassignmentCoordinator::new(store.clone(), policy),
            store,
            admin_ids: Arc::new(admin_ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.contains(user_id)
    }

    /// Create a team, moving already known members out of their old assignments.
    ///
    /// Every known member is rebalanced before the membership is written, and
    /// no incoming member is picked as a replacement. Once the team exists,
    /// its understaffed pull requests are topped up from the new roster.
    pub async fn add_team(
        &self,
        name: &str,
        members: &[User],
        cancel: &CancellationToken,
    ) -> Result<Team, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::invalid_input_field("team name is empty", "team_name"));
        }

        match self.store.get_team_by_name(name).await {
            Ok(_) => {
                return Err(AppError::TeamAlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(AppError::upstream("get_team_by_name", name, e)),
        }

        // No incoming member may take over a review from another.
        let incoming: HashSet<String> = members.iter().map(|m| m.id.clone()).collect();
        for member in members {
            match self.store.get_user(&member.id).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(AppError::upstream("get_user", member.id.as_str(), e)),
            }

            log::info!(
                "[assignment] Rebalancing {} before joining team {}",
                member.id,
                name
            );
            self.coordinator
                .rebalance_user_excluding(&member.id, &incoming, cancel)
                .await?;
        }

        let team = self.store.add_team(name, members).await.map_err(|e| {
            if e.is_already_exists() {
                AppError::TeamAlreadyExists {
                    name: name.to_string(),
                }
            } else {
                AppError::upstream("add_team", name, e)
            }
        })?;

        log::info!(
            "[assignment] Created team {} ({} members, {} active)",
            team.name,
            team.members.len(),
            team.active_members().count()
        );

        match self.coordinator.refill_team(team.id).await {
            Ok(refilled) if !refilled.is_empty() => log::info!(
                "[assignment] Restaffed {} pull requests for team {}",
                refilled.len(),
                team.name
            ),
            Ok(_) => {}
            Err(e) => log::warn!("[assignment] Roster re-scan for {} failed: {}", team.name, e),
        }

        Ok(team)
    }

    pub async fn get_team(&self, name: &str) -> Result<Team, AppError> {
        self.store
            .get_team_by_name(name)
            .await
            .map_err(|e| AppError::from_store("get_team_by_name", "team", name, e))
    }

    /// Toggle a user's availability.
    ///
    /// Deactivation moves the user's open reviews to teammates; activation
    /// offers the user to understaffed pull requests of their team. Setting the
    /// current value again changes nothing.
    pub async fn set_user_active(
        &self,
        user_id: &str,
        is_active: bool,
        cancel: &CancellationToken,
    ) -> Result<User, AppError> {
        let mut user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| AppError::from_store("get_user", "user", user_id, e))?;

        if user.is_active == is_active {
            return Ok(user);
        }

        user.is_active = is_active;
        self.store
            .update_user(&user)
            .await
            .map_err(|e| AppError::from_store("update_user", "user", user_id, e))?;

        if is_active {
            let filled = self.coordinator.backfill_after_activation(&user).await?;
            log::info!(
                "[assignment] {} activated, added to {} pull requests",
                user_id,
                filled.len()
            );
        } else {
            let report = self.coordinator.rebalance_user(user_id, cancel).await?;
            log::info!(
                "[assignment] {} deactivated, {} pull requests reassigned",
                user_id,
                report.updated.len()
            );
        }

        Ok(user)
    }

    /// Deactivate several members of one team and rebalance each of them.
    ///
    /// Everyone listed is marked inactive before any rebalance starts, so none
    /// of them is picked to replace another.
    pub async fn deactivate_team_members(
        &self,
        team_name: &str,
        user_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Team, AppError> {
        let team = self.get_team(team_name).await?;

        let mut deactivated = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let Some(member) = team.members.iter().find(|m| &m.id == user_id) else {
                return Err(AppError::invalid_input_field(
                    format!("user {} is not a member of team {}", user_id, team_name),
                    "user_ids",
                ));
            };
            deactivated.push(User {
                is_active: false,
                ..member.clone()
            });
        }

        for user in &deactivated {
            self.store
                .update_user(user)
                .await
                .map_err(|e| AppError::from_store("update_user", "user", user.id.as_str(), e))?;
        }

        let mut combined = RebalanceFailure {
            user_id: user_ids.join(","),
            updated: Vec::new(),
            failures: Vec::new(),
            cleanup_error: None,
        };
        for user in &deactivated {
            match self.coordinator.rebalance_user(&user.id, cancel).await {
                Ok(report) => combined.updated.extend(report.updated),
                Err(AppError::Rebalance(failure)) => {
                    combined.updated.extend(failure.updated);
                    combined.failures.extend(failure.failures);
                    if combined.cleanup_error.is_none() {
                        combined.cleanup_error = failure.cleanup_error;
                    }
                }
                Err(e) => combined.failures.push((user.id.clone(), e)),
            }
        }

        if !combined.failures.is_empty() || combined.cleanup_error.is_some() {
            return Err(AppError::Rebalance(combined));
        }

        log::info!(
            "[assignment] Deactivated {} members of {}, {} pull requests reassigned",
            deactivated.len(),
            team_name,
            combined.updated.len()
        );
        self.get_team(team_name).await
    }

    /// Get a user and the name of their team.
    pub async fn get_user_with_team(&self, user_id: &str) -> Result<(User, Option<String>), AppError> {
        self.store
            .get_user_with_team(user_id)
            .await
            .map_err(|e| AppError::from_store("get_user_with_team", "user", user_id, e))
    }

    /// Open a pull request and staff it from the author's team.
    pub async fn create_pr(
        &self,
        pr_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        if pr_id.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "pull request id is empty",
                "pull_request_id",
            ));
        }

        match self.store.get_pr(pr_id).await {
            Ok(_) => {
                return Err(AppError::PrAlreadyExists {
                    id: pr_id.to_string(),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(AppError::upstream("get_pr", pr_id, e)),
        }

        let author_missing = || AppError::AuthorOrTeamNotFound {
            author_id: author_id.to_string(),
        };
        let author = match self.store.get_user(author_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(author_missing()),
            Err(e) => return Err(AppError::upstream("get_user", author_id, e)),
        };
        let team_id = author.team_id.ok_or_else(author_missing)?;
        let team = match self.store.get_team(team_id).await {
            Ok(team) => team,
            Err(e) if e.is_not_found() => return Err(author_missing()),
            Err(e) => return Err(AppError::upstream("get_team", team_id.to_string(), e)),
        };

        let selection = self
            .coordinator
            .policy()
            .initial_reviewers(&author.id, &team.members);

        let mut pr = PullRequest::open(pr_id, name, author);
        pr.reviewers = selection.reviewers;
        pr.need_more_reviewers = selection.need_more_reviewers;

        self.store.add_pr(&pr).await.map_err(|e| {
            if e.is_already_exists() {
                AppError::PrAlreadyExists {
                    id: pr_id.to_string(),
                }
            } else {
                AppError::upstream("add_pr", pr_id, e)
            }
        })?;

        log::info!(
            "[assignment] Created {} with reviewers {:?}",
            pr.id,
            pr.reviewer_ids()
        );
        Ok(pr)
    }

    /// Every pull request (open or merged) the user reviews.
    pub async fn get_user_prs(&self, user_id: &str) -> Result<Vec<PullRequest>, AppError> {
        self.store
            .get_user(user_id)
            .await
            .map_err(|e| AppError::from_store("get_user", "user", user_id, e))?;

        self.store
            .get_user_prs(user_id, false)
            .await
            .map_err(|e| AppError::upstream("get_user_prs", user_id, e))
    }

    /// Merge a pull request on behalf of a reviewer or an admin.
    pub async fn merge(&self, acting_user_id: &str, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut pr = self
            .store
            .get_pr(pr_id)
            .await
            .map_err(|e| AppError::from_store("get_pr", "pull request", pr_id, e))?;

        if !pr.is_open() {
            return Err(AppError::unable_to_merge(pr_id, "pull request is not open"));
        }
        if !self.is_admin(acting_user_id) && !pr.has_reviewer(acting_user_id) {
            return Err(AppError::unable_to_merge(
                pr_id,
                format!("{} is neither a reviewer nor an admin", acting_user_id),
            ));
        }

        pr.mark_merged(Utc::now());
        self.store
            .update_pr(pr_id, &pr)
            .await
            .map_err(|e| AppError::from_store("update_pr", "pull request", pr_id, e))?;

        log::info!("[assignment] {} merged by {}", pr_id, acting_user_id);
        Ok(pr)
    }

    /// Admin-triggered replacement of one reviewer.
    pub async fn reassign(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignOutcome, AppError> {
        self.coordinator
            .reassign(pr_id, old_reviewer_id, ReassignTrigger::Explicit)
            .await
    }

    pub async fn statistics(&self) -> Result<ReviewStats, AppError> {
        self.store
            .review_stats()
            .await
            .map_err(|e| AppError::upstream("review_stats", "*", e))
    }
}

impl std::fmt::Debug for AssignmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentService")
            .field("coordinator", &self.coordinator)
            .field("admin_ids", &self.admin_ids)
            .finish_non_exhaustive()
    }
}
