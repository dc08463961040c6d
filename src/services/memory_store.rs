//! In-memory implementation of `ReviewStore`.
//!
//! All state lives behind one `RwLock`, so every mutation is atomic and
//! writes to the same record are serialised. State is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::{ReviewStore, StoreError};
use crate::models::{PrStatus, PullRequest, ReviewStats, Team, TeamId, User};

/// Stored form of a pull request: users are kept by ID only.
#[derive(Debug, Clone)]
struct PrRecord {
    id: String,
    name: String,
    author_id: String,
    reviewer_ids: Vec<String>,
    status: PrStatus,
    need_more_reviewers: bool,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl From<&PullRequest> for PrRecord {
    fn from(pr: &PullRequest) -> Self {
        Self {
            id: pr.id.clone(),
            name: pr.name.clone(),
            author_id: pr.author.id.clone(),
            reviewer_ids: pr.reviewers.iter().map(|r| r.id.clone()).collect(),
            status: pr.status,
            need_more_reviewers: pr.need_more_reviewers,
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// Team ID → team name.
    teams: HashMap<TeamId, String>,
    users: HashMap<String, User>,
    prs: HashMap<String, PrRecord>,
    next_team_id: TeamId,
}

impl State {
    fn user_or_placeholder(&self, id: &str) -> User {
        self.users.get(id).cloned().unwrap_or_else(|| User {
            id: id.to_string(),
            name: String::new(),
            is_active: false,
            team_id: None,
        })
    }

    fn hydrate(&self, record: &PrRecord) -> PullRequest {
        PullRequest {
            id: record.id.clone(),
            name: record.name.clone(),
            author: self.user_or_placeholder(&record.author_id),
            reviewers: record
                .reviewer_ids
                .iter()
                .map(|id| self.user_or_placeholder(id))
                .collect(),
            status: record.status,
            need_more_reviewers: record.need_more_reviewers,
            created_at: record.created_at,
            merged_at: record.merged_at,
        }
    }

    /// Newest first, ties broken by ID so results are stable.
    fn hydrate_sorted<'a>(&self, records: impl Iterator<Item = &'a PrRecord>) -> Vec<PullRequest> {
        let mut prs: Vec<PullRequest> = records.map(|r| self.hydrate(r)).collect();
        prs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        prs
    }

    fn team(&self, id: TeamId) -> Option<Team> {
        let name = self.teams.get(&id)?;
        let mut members: Vec<User> = self
            .users
            .values()
            .filter(|u| u.team_id == Some(id))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Some(Team {
            id,
            name: name.clone(),
            members,
        })
    }
}

/// In-memory review store.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_team_id: 1,
                ..State::default()
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn get_team_by_name(&self, name: &str) -> Result<Team, StoreError> {
        let state = self.state.read().await;
        state
            .teams
            .iter()
            .find(|(_, team_name)| team_name.as_str() == name)
            .and_then(|(id, _)| state.team(*id))
            .ok_or_else(|| StoreError::not_found("team", name))
    }

    async fn get_team(&self, id: TeamId) -> Result<Team, StoreError> {
        let state = self.state.read().await;
        state
            .team(id)
            .ok_or_else(|| StoreError::not_found("team", id.to_string()))
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        let state = self.state.read().await;
        state
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn get_user_with_team(&self, id: &str) -> Result<(User, Option<String>), StoreError> {
        let state = self.state.read().await;
        let user = state
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))?;
        let team_name = user.team_id.and_then(|t| state.teams.get(&t).cloned());
        Ok((user, team_name))
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("user", user.id.clone())),
        }
    }

    async fn add_team(&self, name: &str, members: &[User]) -> Result<Team, StoreError> {
        let mut state = self.state.write().await;
        if state.teams.values().any(|n| n == name) {
            return Err(StoreError::already_exists("team", name));
        }

        let team_id = state.next_team_id;
        state.next_team_id += 1;
        state.teams.insert(team_id, name.to_string());

        for member in members {
            let user = User {
                team_id: Some(team_id),
                ..member.clone()
            };
            state.users.insert(user.id.clone(), user);
        }

        state
            .team(team_id)
            .ok_or_else(|| StoreError::backend("add_team", "team vanished after insert"))
    }

    async fn get_pr(&self, id: &str) -> Result<PullRequest, StoreError> {
        let state = self.state.read().await;
        state
            .prs
            .get(id)
            .map(|r| state.hydrate(r))
            .ok_or_else(|| StoreError::not_found("pull request", id))
    }

    async fn add_pr(&self, pr: &PullRequest) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.prs.contains_key(&pr.id) {
            return Err(StoreError::already_exists("pull request", pr.id.clone()));
        }
        if !state.users.contains_key(&pr.author.id) {
            return Err(StoreError::not_found("user", pr.author.id.clone()));
        }
        state.prs.insert(pr.id.clone(), PrRecord::from(pr));
        Ok(())
    }

    async fn update_pr(&self, id: &str, pr: &PullRequest) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let Some(record) = state.prs.get_mut(id) else {
            return Err(StoreError::not_found("pull request", id));
        };
        let author_id = record.author_id.clone();
        *record = PrRecord {
            id: id.to_string(),
            author_id,
            ..PrRecord::from(pr)
        };
        Ok(())
    }

    async fn get_user_prs(
        &self,
        user_id: &str,
        only_open: bool,
    ) -> Result<Vec<PullRequest>, StoreError> {
        let state = self.state.read().await;
        let matching = state.prs.values().filter(|r| {
            r.reviewer_ids.iter().any(|id| id == user_id)
                && (!only_open || r.status == PrStatus::Open)
        });
        Ok(state.hydrate_sorted(matching))
    }

    async fn get_team_prs(&self, team_id: TeamId) -> Result<Vec<PullRequest>, StoreError> {
        let state = self.state.read().await;
        let in_team = |id: &str| {
            state
                .users
                .get(id)
                .is_some_and(|u| u.team_id == Some(team_id))
        };
        let matching = state
            .prs
            .values()
            .filter(|r| {
                in_team(r.author_id.as_str())
                    || r.reviewer_ids.iter().any(|id| in_team(id.as_str()))
            });
        Ok(state.hydrate_sorted(matching))
    }

    async fn remove_reviewer_from_all_open_prs(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.write().await;
        let mut affected = Vec::new();
        for record in state.prs.values_mut() {
            if record.status != PrStatus::Open {
                continue;
            }
            let before = record.reviewer_ids.len();
            record.reviewer_ids.retain(|id| id != user_id);
            if record.reviewer_ids.len() != before {
                record.need_more_reviewers = true;
                affected.push(record.id.clone());
            }
        }
        affected.sort();
        Ok(affected)
    }

    async fn add_reviewer_to_pr(&self, pr_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        let Some(record) = state.prs.get_mut(pr_id) else {
            return Err(StoreError::not_found("pull request", pr_id));
        };
        if record.author_id != user_id && !record.reviewer_ids.iter().any(|id| id == user_id) {
            record.reviewer_ids.push(user_id.to_string());
        }
        Ok(())
    }

    async fn review_stats(&self) -> Result<ReviewStats, StoreError> {
        let state = self.state.read().await;
        let mut stats = ReviewStats::default();
        for record in state.prs.values() {
            stats
                .reviewers_per_pr
                .insert(record.id.clone(), record.reviewer_ids.len() as u64);
            for reviewer in &record.reviewer_ids {
                *stats.reviews_per_user.entry(reviewer.clone()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}
