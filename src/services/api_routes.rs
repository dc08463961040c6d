//! REST routes over the assignment engine.
//!
//! Request and response bodies keep the field names clients of the service
//! already use (`team_name`, `user_id`, `pull_request_id`, ...).

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{PullRequest, ReviewStats, Team, User};
use crate::services::api_auth::Caller;
use crate::services::api_server::ApiState;

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

/// Status code and wire error code for an engine error.
pub fn status_and_code(err: &AppError) -> (StatusCode, &'static str) {
    match err {
        AppError::NotFound { .. } | AppError::AuthorOrTeamNotFound { .. } => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        }
        AppError::TeamAlreadyExists { .. } => (StatusCode::BAD_REQUEST, "TEAM_EXISTS"),
        AppError::PrAlreadyExists { .. } => (StatusCode::CONFLICT, "PR_EXISTS"),
        AppError::PrMerged { .. } => (StatusCode::CONFLICT, "PR_MERGED"),
        AppError::UnableToMerge { .. } => (StatusCode::CONFLICT, "UNABLE_TO_MERGE"),
        AppError::ReviewerNotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
        AppError::NoCandidate { .. } => (StatusCode::CONFLICT, "NO_CANDIDATE"),
        AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        AppError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        AppError::Rebalance(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PARTIAL_FAILURE"),
        AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        AppError::Upstream { .. } | AppError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(&self.0);
        if self.0.is_expected() {
            log::warn!("[api] {}: {}", code, self.0);
        } else {
            log::error!("[api] {}: {}", code, self.0);
        }
        (status, Json(ErrorResponse::new(code, self.0.to_string()))).into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(format!(
            "invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(format!(
            "invalid query: {}",
            rejection.body_text()
        )))
    }
}

// ── DTOs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberDto {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl From<&User> for MemberDto {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.name.clone(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<MemberDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamDto {
    pub team_name: String,
    pub members: Vec<MemberDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: TeamDto,
}

impl From<&Team> for TeamResponse {
    fn from(team: &Team) -> Self {
        Self {
            team: TeamDto {
                team_name: team.name.clone(),
                members: team.members.iter().map(MemberDto::from).collect(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeactivateMembersRequest {
    pub team_name: String,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
    pub team_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserDto,
}

impl UserResponse {
    fn new(user: &User, team_name: Option<String>) -> Self {
        Self {
            user: UserDto {
                user_id: user.id.clone(),
                username: user.name.clone(),
                is_active: user.is_active,
                team_name,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestDto {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
    pub assigned_reviewers: Vec<String>,
    pub need_more_reviewers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<&PullRequest> for PullRequestDto {
    fn from(pr: &PullRequest) -> Self {
        Self {
            pull_request_id: pr.id.clone(),
            pull_request_name: pr.name.clone(),
            author_id: pr.author.id.clone(),
            status: pr.status.to_string(),
            assigned_reviewers: pr.reviewers.iter().map(|r| r.id.clone()).collect(),
            need_more_reviewers: pr.need_more_reviewers,
            created_at: Some(pr.created_at),
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequestDto,
    pub replaced_by: Option<String>,
}

/// Short form used in review listings.
#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestShortDto {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShortDto>,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

// ── Routers ──────────────────────────────────────────────────────────────────

/// Routes open to everyone.
pub fn public_routes() -> Router<ApiState> {
    Router::new().route("/health", get(health_handler))
}

/// Routes that require an admin identity.
pub fn admin_routes() -> Router<ApiState> {
    Router::new()
        .route("/team/add", post(add_team_handler))
        .route("/team/deactivate", post(deactivate_members_handler))
        .route("/users/setIsActive", post(set_is_active_handler))
        .route("/pullRequest/create", post(create_pr_handler))
        .route("/pullRequest/reassign", post(reassign_handler))
        .route("/stats", get(stats_handler))
}

/// Routes available to any identified user.
pub fn user_routes() -> Router<ApiState> {
    Router::new()
        .route("/team/get", get(get_team_handler))
        .route("/users/get", get(get_user_handler))
        .route("/users/getReview", get(get_review_handler))
        .route("/pullRequest/merge", post(merge_handler))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /team/add: create a team and upsert its members.
async fn add_team_handler(
    State(state): State<ApiState>,
    body: Result<Json<AddTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(body) = body?;
    if body.team_name.trim().is_empty() {
        return Err(AppError::invalid_input_field("empty team name", "team_name").into());
    }
    if body.members.is_empty() {
        return Err(AppError::invalid_input_field("empty team members", "members").into());
    }

    let members: Vec<User> = body
        .members
        .into_iter()
        .map(|m| User::new(m.user_id, m.username, m.is_active))
        .collect();
    let team = state
        .service
        .add_team(&body.team_name, &members, &state.cancel)
        .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse::from(&team))))
}

/// GET /team/get?team_name=
async fn get_team_handler(
    State(state): State<ApiState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Query(query) = query?;
    let team = state.service.get_team(&query.team_name).await?;
    Ok(Json(TeamResponse::from(&team)))
}

/// POST /team/deactivate: deactivate several members at once.
async fn deactivate_members_handler(
    State(state): State<ApiState>,
    body: Result<Json<DeactivateMembersRequest>, JsonRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Json(body) = body?;
    if body.user_ids.is_empty() {
        return Err(AppError::invalid_input_field("no users given", "user_ids").into());
    }
    let team = state
        .service
        .deactivate_team_members(&body.team_name, &body.user_ids, &state.cancel)
        .await?;
    Ok(Json(TeamResponse::from(&team)))
}

/// POST /users/setIsActive
async fn set_is_active_handler(
    State(state): State<ApiState>,
    body: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Json(body) = body?;
    state
        .service
        .set_user_active(&body.user_id, body.is_active, &state.cancel)
        .await?;
    let (user, team_name) = state.service.get_user_with_team(&body.user_id).await?;
    Ok(Json(UserResponse::new(&user, team_name)))
}

/// GET /users/get?user_id=
async fn get_user_handler(
    State(state): State<ApiState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Query(query) = query?;
    let (user, team_name) = state.service.get_user_with_team(&query.user_id).await?;
    Ok(Json(UserResponse::new(&user, team_name)))
}

/// GET /users/getReview?user_id=: pull requests the user reviews.
async fn get_review_handler(
    State(state): State<ApiState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserReviewsResponse>, ApiErr> {
    let Query(query) = query?;
    let prs = state.service.get_user_prs(&query.user_id).await?;
    Ok(Json(UserReviewsResponse {
        user_id: query.user_id,
        pull_requests: prs
            .iter()
            .map(|pr| PullRequestShortDto {
                pull_request_id: pr.id.clone(),
                pull_request_name: pr.name.clone(),
                author_id: pr.author.id.clone(),
                status: pr.status.to_string(),
            })
            .collect(),
    }))
}

/// POST /pullRequest/create
async fn create_pr_handler(
    State(state): State<ApiState>,
    body: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequestResponse>), ApiErr> {
    let Json(body) = body?;
    let pr = state
        .service
        .create_pr(&body.pull_request_id, &body.pull_request_name, &body.author_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PullRequestResponse {
            pr: PullRequestDto::from(&pr),
        }),
    ))
}

/// POST /pullRequest/merge: merge as the calling user.
async fn merge_handler(
    State(state): State<ApiState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<PullRequestResponse>, ApiErr> {
    let Json(body) = body?;
    let pr = state.service.merge(&caller.0, &body.pull_request_id).await?;
    Ok(Json(PullRequestResponse {
        pr: PullRequestDto::from(&pr),
    }))
}

/// POST /pullRequest/reassign
async fn reassign_handler(
    State(state): State<ApiState>,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiErr> {
    let Json(body) = body?;
    let outcome = state
        .service
        .reassign(&body.pull_request_id, &body.old_user_id)
        .await?;
    Ok(Json(ReassignResponse {
        pr: PullRequestDto::from(&outcome.pull_request),
        replaced_by: outcome.replaced_by,
    }))
}

/// GET /stats: assignment counts per reviewer and per pull request.
async fn stats_handler(State(state): State<ApiState>) -> Result<Json<ReviewStats>, ApiErr> {
    Ok(Json(state.service.statistics().await?))
}
