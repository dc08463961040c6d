//! End-to-end assignment scenarios against the in-memory store.
//!
//! Covers:
//! 1. Initial staffing from the author's team
//! 2. Deactivation with and without a free teammate
//! 3. Bulk rebalance with a failing store write (partial failure)
//! 4. Merge permissions and the terminal MERGED state
//! 5. Team moves, reactivation backfill and roster re-scan
//! 6. Concurrent fan-out and cancellation while tasks are running
//!
//! Randomness is seeded so every run picks the same reviewers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Barrier;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use pr_reviewer_service::error::AppError;
use pr_reviewer_service::logging;
use pr_reviewer_service::models::{PullRequest, ReviewStats, Team, TeamId, User};
use pr_reviewer_service::services::selection::shared_rng;
use pr_reviewer_service::services::{
    AssignmentService, InMemoryStore, ReviewStore, SelectionPolicy, StoreError,
};

/// Store wrapper that can fail, synchronise or interrupt `update_pr` calls.
struct ControlledStore {
    inner: InMemoryStore,
    failing_updates: Mutex<HashSet<String>>,
    update_barrier: Mutex<Option<Arc<Barrier>>>,
    cancel_on_update: Mutex<Option<CancellationToken>>,
    cancelled_during: Mutex<Option<String>>,
}

impl ControlledStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            failing_updates: Mutex::new(HashSet::new()),
            update_barrier: Mutex::new(None),
            cancel_on_update: Mutex::new(None),
            cancelled_during: Mutex::new(None),
        }
    }

    fn fail_updates_of(&self, pr_id: &str) {
        self.failing_updates.lock().unwrap().insert(pr_id.to_string());
    }

    /// Every `update_pr` waits until `n` of them are in flight.
    fn sync_updates(&self, n: usize) {
        *self.update_barrier.lock().unwrap() = Some(Arc::new(Barrier::new(n)));
    }

    /// The next `update_pr` cancels `token` before it writes.
    fn cancel_during_next_update(&self, token: CancellationToken) {
        *self.cancel_on_update.lock().unwrap() = Some(token);
    }

    fn cancelled_during(&self) -> Option<String> {
        self.cancelled_during.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewStore for ControlledStore {
    async fn get_team_by_name(&self, name: &str) -> Result<Team, StoreError> {
        self.inner.get_team_by_name(name).await
    }

    async fn get_team(&self, id: TeamId) -> Result<Team, StoreError> {
        self.inner.get_team(id).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.inner.get_user(id).await
    }

    async fn get_user_with_team(&self, id: &str) -> Result<(User, Option<String>), StoreError> {
        self.inner.get_user_with_team(id).await
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.update_user(user).await
    }

    async fn add_team(&self, name: &str, members: &[User]) -> Result<Team, StoreError> {
        self.inner.add_team(name, members).await
    }

    async fn get_pr(&self, id: &str) -> Result<PullRequest, StoreError> {
        self.inner.get_pr(id).await
    }

    async fn add_pr(&self, pr: &PullRequest) -> Result<(), StoreError> {
        self.inner.add_pr(pr).await
    }

    async fn update_pr(&self, id: &str, pr: &PullRequest) -> Result<(), StoreError> {
        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(StoreError::backend("update_pr", "connection reset"));
        }
        let barrier = self.update_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        let token = self.cancel_on_update.lock().unwrap().take();
        if let Some(token) = token {
            *self.cancelled_during.lock().unwrap() = Some(id.to_string());
            token.cancel();
        }
        self.inner.update_pr(id, pr).await
    }

    async fn get_user_prs(
        &self,
        user_id: &str,
        only_open: bool,
    ) -> Result<Vec<PullRequest>, StoreError> {
        self.inner.get_user_prs(user_id, only_open).await
    }

    async fn get_team_prs(&self, team_id: TeamId) -> Result<Vec<PullRequest>, StoreError> {
        self.inner.get_team_prs(team_id).await
    }

    async fn remove_reviewer_from_all_open_prs(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.remove_reviewer_from_all_open_prs(user_id).await
    }

    async fn add_reviewer_to_pr(&self, pr_id: &str, user_id: &str) -> Result<(), StoreError> {
        self.inner.add_reviewer_to_pr(pr_id, user_id).await
    }

    async fn review_stats(&self) -> Result<ReviewStats, StoreError> {
        self.inner.review_stats().await
    }
}

fn service_over(store: Arc<dyn ReviewStore>) -> AssignmentService {
    AssignmentService::new(
        store,
        SelectionPolicy::new(2, shared_rng(StdRng::seed_from_u64(2024))),
        ["admin"],
    )
}

fn members(roster: &[(&str, bool)]) -> Vec<User> {
    roster
        .iter()
        .map(|(id, active)| User::new(*id, id.to_uppercase(), *active))
        .collect()
}

fn sorted_reviewers(pr: &PullRequest) -> Vec<String> {
    let mut ids: Vec<String> = pr.reviewers.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids
}

fn assert_invariants(pr: &PullRequest) {
    let ids = pr.reviewer_ids();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate reviewers on {}", pr.id);
    assert!(
        !unique.contains(pr.author.id.as_str()),
        "author reviews own pull request {}",
        pr.id
    );
}

#[tokio::test]
async fn test_full_team_yields_two_reviewers() {
    let svc = service_over(Arc::new(InMemoryStore::new()));
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();

    let pr = svc.create_pr("pr-1", "Add search", "a").await.unwrap();

    assert_eq!(sorted_reviewers(&pr), vec!["b", "c"]);
    assert!(!pr.need_more_reviewers);
    assert_invariants(&pr);
}

#[tokio::test]
async fn test_lone_author_gets_no_reviewers() {
    let svc = service_over(Arc::new(InMemoryStore::new()));
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", false)]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let pr = svc.create_pr("pr-1", "Add search", "a").await.unwrap();

    assert!(pr.reviewers.is_empty());
    assert!(pr.need_more_reviewers);
}

#[tokio::test]
async fn test_large_team_picks_two_active_teammates() {
    let svc = service_over(Arc::new(InMemoryStore::new()));
    svc.add_team(
        "T",
        &members(&[
            ("a", true),
            ("b", true),
            ("c", false),
            ("d", true),
            ("e", true),
            ("f", true),
        ]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    for i in 0..20 {
        let pr = svc.create_pr(&format!("pr-{i}"), "Change", "a").await.unwrap();
        assert_eq!(pr.reviewers.len(), 2);
        assert!(!pr.need_more_reviewers);
        assert!(pr.reviewers.iter().all(|r| r.is_active && r.id != "c"));
        assert_invariants(&pr);
    }
}

#[tokio::test]
async fn test_deactivation_without_spare_teammate_leaves_pr_understaffed() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Add search", "a").await.unwrap();

    svc.set_user_active("b", false, &cancel).await.unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(pr.reviewer_ids(), vec!["c"]);
    assert!(pr.need_more_reviewers);
}

#[tokio::test]
async fn test_deactivation_hands_reviews_to_free_teammate() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Add search", "a").await.unwrap();
    let mut d = User::new("d", "D", true);
    svc.add_team("U", std::slice::from_ref(&d), &cancel).await.unwrap();
    d.team_id = store.get_team_by_name("T").await.map(|t| t.id).ok();
    store.update_user(&d).await.unwrap();

    svc.set_user_active("b", false, &cancel).await.unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(sorted_reviewers(&pr), vec!["c", "d"]);
    assert!(!pr.need_more_reviewers);
    assert!(store.get_user_prs("b", true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_rebalance_reports_partial_failure_and_keeps_other_updates() {
    let store = Arc::new(ControlledStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();

    svc.add_team("home", &members(&[("u", true)]), &cancel)
        .await
        .unwrap();
    let reviewer = store.get_user("u").await.unwrap();
    for i in 0..5 {
        let author = format!("author-{i}");
        let spare = format!("spare-{i}");
        svc.add_team(
            &format!("team-{i}"),
            &[User::new(&author, "Author", true), User::new(&spare, "Spare", true)],
            &cancel,
        )
        .await
        .unwrap();

        let mut pr = PullRequest::open(
            format!("pr-{i}"),
            "Cross-team change",
            store.get_user(&author).await.unwrap(),
        );
        pr.add_reviewer(reviewer.clone());
        store.add_pr(&pr).await.unwrap();
    }
    store.fail_updates_of("pr-3");

    let err = svc.set_user_active("u", false, &cancel).await.unwrap_err();

    let AppError::Rebalance(failure) = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert_eq!(failure.user_id, "u");
    assert_eq!(failure.updated.len(), 4);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].0, "pr-3");
    assert!(failure.cleanup_error.is_none());

    for i in 0..5 {
        let pr = store.get_pr(&format!("pr-{i}")).await.unwrap();
        assert!(!pr.has_reviewer("u"), "u still reviews {}", pr.id);
        assert_invariants(&pr);
        if i == 3 {
            assert!(pr.reviewers.is_empty());
            assert!(pr.need_more_reviewers);
        } else {
            assert_eq!(pr.reviewer_ids(), vec![format!("spare-{i}").as_str()]);
        }
    }
    assert!(!store.get_user("u").await.unwrap().is_active);
}

#[tokio::test]
async fn test_bulk_rebalance_handles_many_pull_requests() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true), ("c", true), ("d", true)]),
        &cancel,
    )
    .await
    .unwrap();
    for i in 0..30 {
        svc.create_pr(&format!("pr-{i}"), "Change", "a").await.unwrap();
    }
    let assigned = store.get_user_prs("b", true).await.unwrap().len();

    svc.set_user_active("b", false, &cancel).await.unwrap();

    assert!(store.get_user_prs("b", true).await.unwrap().is_empty());
    let stats = svc.statistics().await.unwrap();
    assert!(!stats.reviews_per_user.contains_key("b"));
    assert!(assigned > 0);
    for i in 0..30 {
        let pr = store.get_pr(&format!("pr-{i}")).await.unwrap();
        assert_eq!(sorted_reviewers(&pr), vec!["c", "d"]);
        assert!(!pr.need_more_reviewers);
    }
}

#[tokio::test]
async fn test_admin_merges_any_pr_but_outsider_cannot() {
    let svc = service_over(Arc::new(InMemoryStore::new()));
    let cancel = CancellationToken::new();
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true), ("c", true), ("d", true)]),
        &cancel,
    )
    .await
    .unwrap();
    let pr = svc.create_pr("pr-1", "Change", "a").await.unwrap();
    let outsider = ["b", "c", "d"]
        .into_iter()
        .find(|id| !pr.has_reviewer(id))
        .unwrap();

    let err = svc.merge(outsider, "pr-1").await.unwrap_err();
    assert!(matches!(err, AppError::UnableToMerge { .. }));

    let merged = svc.merge("admin", "pr-1").await.unwrap();
    assert!(merged.is_merged());
    assert!(merged.merged_at.is_some());

    let err = svc.merge("missing", "pr-404").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_merged_pr_is_never_reassigned() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true), ("c", true), ("d", true)]),
        &cancel,
    )
    .await
    .unwrap();
    let pr = svc.create_pr("pr-1", "Change", "a").await.unwrap();
    let reviewer = pr.reviewers[0].id.clone();
    let merged = svc.merge(&reviewer, "pr-1").await.unwrap();

    let err = svc.reassign("pr-1", &reviewer).await.unwrap_err();
    assert!(matches!(err, AppError::PrMerged { .. }));

    svc.set_user_active(&reviewer, false, &cancel).await.unwrap();
    let stored = store.get_pr("pr-1").await.unwrap();
    assert!(stored.is_merged());
    assert_eq!(stored.reviewer_ids(), merged.reviewer_ids());
    assert_eq!(stored.merged_at, merged.merged_at);
}

#[tokio::test]
async fn test_explicit_reassign_with_exhausted_team() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true), ("c", true)]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    svc.create_pr("pr-1", "Change", "a").await.unwrap();

    let err = svc.reassign("pr-1", "b").await.unwrap_err();
    assert!(matches!(err, AppError::NoCandidate { .. }));

    let err = svc.reassign("pr-1", "a").await.unwrap_err();
    assert!(matches!(err, AppError::ReviewerNotAssigned { .. }));

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(sorted_reviewers(&pr), vec!["b", "c"]);
}

#[tokio::test]
async fn test_reassignment_is_stable_when_repeated() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Change", "a").await.unwrap();

    svc.set_user_active("b", false, &cancel).await.unwrap();
    let first = store.get_pr("pr-1").await.unwrap();

    // A second rebalance for the same user finds nothing left to move.
    let coordinator = pr_reviewer_service::services::ReassignmentCoordinator::new(
        store.clone(),
        SelectionPolicy::new(2, shared_rng(StdRng::seed_from_u64(1))),
    );
    let report = coordinator.rebalance_user("b", &cancel).await.unwrap();
    assert!(report.updated.is_empty());

    let team_id = store.get_user("a").await.unwrap().team_id.unwrap();
    coordinator.refill_team(team_id).await.unwrap();
    coordinator.refill_team(team_id).await.unwrap();

    let second = store.get_pr("pr-1").await.unwrap();
    assert_eq!(first.reviewer_ids(), second.reviewer_ids());
    assert_eq!(first.need_more_reviewers, second.need_more_reviewers);
}

#[tokio::test]
async fn test_reactivation_backfills_understaffed_prs() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Change", "a").await.unwrap();
    svc.set_user_active("b", false, &cancel).await.unwrap();
    assert!(store.get_pr("pr-1").await.unwrap().need_more_reviewers);

    svc.set_user_active("b", true, &cancel).await.unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(sorted_reviewers(&pr), vec!["b", "c"]);
    assert!(!pr.need_more_reviewers);
}

#[tokio::test]
async fn test_moving_member_to_new_team_rebalances_old_reviews() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true), ("c", true), ("d", true)]),
        &cancel,
    )
    .await
    .unwrap();
    let pr = svc.create_pr("pr-1", "Change", "a").await.unwrap();
    let mover = pr.reviewers[0].id.clone();

    svc.add_team("U", &[User::new(&mover, "Mover", true)], &cancel)
        .await
        .unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert!(!pr.has_reviewer(&mover));
    assert_eq!(pr.reviewers.len(), 2);
    assert!(!pr.need_more_reviewers);
    let (_, team) = svc.get_user_with_team(&mover).await.unwrap();
    assert_eq!(team.as_deref(), Some("U"));
}

#[tokio::test]
async fn test_new_team_restaffs_prs_of_its_members() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("solo", &members(&[("x", true)]), &cancel)
        .await
        .unwrap();
    let pr = svc.create_pr("pr-1", "Change", "x").await.unwrap();
    assert!(pr.need_more_reviewers);

    svc.add_team("duo", &members(&[("x", true), ("y", true)]), &cancel)
        .await
        .unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(pr.reviewer_ids(), vec!["y"]);
    assert!(pr.need_more_reviewers);
}

#[tokio::test]
async fn test_deactivating_several_members_never_picks_one_of_them() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Change", "a").await.unwrap();
    let mut d = User::new("d", "D", true);
    svc.add_team("U", std::slice::from_ref(&d), &cancel).await.unwrap();
    d.team_id = store.get_team_by_name("T").await.map(|t| t.id).ok();
    store.update_user(&d).await.unwrap();

    let team = svc
        .deactivate_team_members("T", &["b".to_string(), "c".to_string()], &cancel)
        .await
        .unwrap();

    assert!(team
        .members
        .iter()
        .filter(|m| m.id == "b" || m.id == "c")
        .all(|m| !m.is_active));
    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(pr.reviewer_ids(), vec!["d"]);
    assert!(pr.need_more_reviewers);
}

#[tokio::test]
async fn test_user_review_listing_includes_merged() {
    let svc = service_over(Arc::new(InMemoryStore::new()));
    svc.add_team(
        "T",
        &members(&[("a", true), ("b", true)]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    svc.create_pr("pr-1", "One", "a").await.unwrap();
    svc.create_pr("pr-2", "Two", "a").await.unwrap();
    svc.merge("b", "pr-1").await.unwrap();

    let prs = svc.get_user_prs("b").await.unwrap();
    assert_eq!(prs.len(), 2);

    let err = svc.get_user_prs("ghost").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

/// Team `T` = {a, b, c, d}; `count` pull requests by `a`, each reviewed by b and c.
async fn team_with_reviewed_prs(
    store: &Arc<ControlledStore>,
    svc: &AssignmentService,
    count: usize,
) {
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    for i in 0..count {
        svc.create_pr(&format!("pr-{i}"), "Change", "a").await.unwrap();
    }
    let mut d = User::new("d", "D", true);
    svc.add_team("U", std::slice::from_ref(&d), &cancel).await.unwrap();
    d.team_id = store.get_team_by_name("T").await.map(|t| t.id).ok();
    store.update_user(&d).await.unwrap();
}

#[tokio::test]
async fn test_bulk_rebalance_runs_reassignments_concurrently() {
    logging::init_test();
    let store = Arc::new(ControlledStore::new());
    let svc = service_over(store.clone());
    team_with_reviewed_prs(&store, &svc, 6).await;

    // Each write waits for all six; awaiting them one by one would never finish.
    store.sync_updates(6);
    timeout(
        Duration::from_secs(5),
        svc.set_user_active("b", false, &CancellationToken::new()),
    )
    .await
    .expect("per-PR reassignments did not run concurrently")
    .unwrap();

    for i in 0..6 {
        let pr = store.get_pr(&format!("pr-{i}")).await.unwrap();
        assert_eq!(sorted_reviewers(&pr), vec!["c", "d"]);
        assert!(!pr.need_more_reviewers);
    }
}

#[tokio::test]
async fn test_cancel_mid_rebalance_keeps_started_work_and_cleans_up() {
    logging::init_test();
    let store = Arc::new(ControlledStore::new());
    let svc = service_over(store.clone());
    team_with_reviewed_prs(&store, &svc, 4).await;

    let cancel = CancellationToken::new();
    store.cancel_during_next_update(cancel.clone());
    let err = svc.set_user_active("b", false, &cancel).await.unwrap_err();

    let committed = store.cancelled_during().expect("no update reached the store");
    let pr = store.get_pr(&committed).await.unwrap();
    assert_eq!(sorted_reviewers(&pr), vec!["c", "d"]);
    assert!(!pr.need_more_reviewers);

    let AppError::Rebalance(failure) = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert!(failure.updated.contains(&committed));
    assert!(!failure.failures.is_empty());
    assert!(failure.cleanup_error.is_none());
    for (pr_id, e) in &failure.failures {
        assert!(matches!(e, AppError::Cancelled), "{pr_id}: {e}");
        let pr = store.get_pr(pr_id).await.unwrap();
        assert_eq!(pr.reviewer_ids(), vec!["c"]);
        assert!(pr.need_more_reviewers);
    }
    for i in 0..4 {
        let pr = store.get_pr(&format!("pr-{i}")).await.unwrap();
        assert!(!pr.has_reviewer("b"), "b still reviews {}", pr.id);
    }
}

#[tokio::test]
async fn test_members_moving_together_never_replace_each_other() {
    logging::init_test();
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team(
        "old",
        &members(&[("a", true), ("x", true), ("y", true), ("w", true)]),
        &cancel,
    )
    .await
    .unwrap();
    let mut pr = PullRequest::open("pr-1", "Change", store.get_user("a").await.unwrap());
    pr.add_reviewer(store.get_user("x").await.unwrap());
    pr.add_reviewer(store.get_user("y").await.unwrap());
    store.add_pr(&pr).await.unwrap();

    svc.add_team("new", &members(&[("x", true), ("y", true)]), &cancel)
        .await
        .unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(pr.reviewer_ids(), vec!["w"]);
    assert!(pr.need_more_reviewers);
}

#[tokio::test]
async fn test_teamless_member_is_rebalanced_on_join() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service_over(store.clone());
    let cancel = CancellationToken::new();
    svc.add_team("T", &members(&[("a", true), ("b", true), ("c", true)]), &cancel)
        .await
        .unwrap();
    svc.create_pr("pr-1", "Change", "a").await.unwrap();
    store.update_user(&User::new("c", "C", true)).await.unwrap();

    svc.add_team("U", &members(&[("c", true)]), &cancel)
        .await
        .unwrap();

    let pr = store.get_pr("pr-1").await.unwrap();
    assert_eq!(pr.reviewer_ids(), vec!["b"]);
    assert!(pr.need_more_reviewers);
}
