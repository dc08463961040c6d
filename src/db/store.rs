//! SQLite implementation of `ReviewStore`.
//!
//! Every multi-statement write runs in its own transaction and starts with a
//! write statement, so SQLite takes the write lock up front and concurrent
//! writers queue on the busy timeout instead of failing on lock upgrade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::pool::DbPool;
use crate::models::{PrStatus, PullRequest, ReviewStats, Team, TeamId, User};
use crate::services::store::{ReviewStore, StoreError};

const USER_COLUMNS: &str = "id, name, is_active, team_id";
const PR_COLUMNS: &str =
    "p.id, p.name, p.author_id, p.status, p.need_more_reviewers, p.created_at, p.merged_at";

/// Row of the `pull_requests` table.
#[derive(Debug, FromRow)]
struct PrRow {
    id: String,
    name: String,
    author_id: String,
    status: String,
    need_more_reviewers: bool,
    created_at: i64,
    merged_at: Option<i64>,
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::backend("decode_timestamp", format!("out of range: {}", ms)))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Review store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn fetch_team(&self, id: TeamId, name: String) -> Result<Team, StoreError> {
        let members = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE team_id = ? ORDER BY id",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Team { id, name, members })
    }

    /// Attach fresh author and reviewer snapshots to a row.
    async fn hydrate(&self, row: PrRow) -> Result<PullRequest, StoreError> {
        let author = self.fetch_user(&row.author_id).await?.unwrap_or(User {
            id: row.author_id.clone(),
            name: String::new(),
            is_active: false,
            team_id: None,
        });

        let reviewers = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.is_active, u.team_id
            FROM pull_request_reviewers r
            JOIN users u ON u.id = r.user_id
            WHERE r.pr_id = ?
            ORDER BY r.position
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PullRequest {
            id: row.id,
            name: row.name,
            author,
            reviewers,
            status: PrStatus::from(row.status.as_str()),
            need_more_reviewers: row.need_more_reviewers,
            created_at: from_millis(row.created_at)?,
            merged_at: row.merged_at.map(from_millis).transpose()?,
        })
    }

    async fn hydrate_all(&self, rows: Vec<PrRow>) -> Result<Vec<PullRequest>, StoreError> {
        let mut prs = Vec::with_capacity(rows.len());
        for row in rows {
            prs.push(self.hydrate(row).await?);
        }
        Ok(prs)
    }
}

/// Replace the reviewer rows of a pull request inside a transaction.
async fn write_reviewers(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    pr_id: &str,
    reviewers: &[User],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM pull_request_reviewers WHERE pr_id = ?")
        .bind(pr_id)
        .execute(&mut **tx)
        .await?;

    for (position, reviewer) in reviewers.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO pull_request_reviewers (pr_id, user_id, position) VALUES (?, ?, ?)",
        )
        .bind(pr_id)
        .bind(&reviewer.id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::not_found("user", reviewer.id.clone())
            } else {
                StoreError::Database(e)
            }
        })?;
    }

    Ok(())
}

#[async_trait]
impl ReviewStore for SqliteStore {
    async fn get_team_by_name(&self, name: &str) -> Result<Team, StoreError> {
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM teams WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let (id, name) = row.ok_or_else(|| StoreError::not_found("team", name))?;
        self.fetch_team(id, name).await
    }

    async fn get_team(&self, id: TeamId) -> Result<Team, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM teams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let (name,) = row.ok_or_else(|| StoreError::not_found("team", id.to_string()))?;
        self.fetch_team(id, name).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.fetch_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn get_user_with_team(&self, id: &str) -> Result<(User, Option<String>), StoreError> {
        let row: Option<(String, String, bool, Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT u.id, u.name, u.is_active, u.team_id, t.name
            FROM users u
            LEFT JOIN teams t ON t.id = u.team_id
            WHERE u.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let (id, name, is_active, team_id, team_name) =
            row.ok_or_else(|| StoreError::not_found("user", id))?;
        Ok((
            User {
                id,
                name,
                is_active,
                team_id,
            },
            team_name,
        ))
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET name = ?, is_active = ?, team_id = ? WHERE id = ?")
            .bind(&user.name)
            .bind(user.is_active)
            .bind(user.team_id)
            .bind(&user.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user.id.clone()));
        }
        Ok(())
    }

    async fn add_team(&self, name: &str, members: &[User]) -> Result<Team, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query("INSERT INTO teams (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::already_exists("team", name)
                } else {
                    StoreError::Database(e)
                }
            })?;
        let team_id = inserted.last_insert_rowid();

        for member in members {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, is_active, team_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    is_active = excluded.is_active,
                    team_id = excluded.team_id
                "#,
            )
            .bind(&member.id)
            .bind(&member.name)
            .bind(member.is_active)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.fetch_team(team_id, name.to_string()).await
    }

    async fn get_pr(&self, id: &str) -> Result<PullRequest, StoreError> {
        let row = sqlx::query_as::<_, PrRow>(&format!(
            "SELECT {} FROM pull_requests p WHERE p.id = ?",
            PR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("pull request", id))?;

        self.hydrate(row).await
    }

    async fn add_pr(&self, pr: &PullRequest) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pull_requests
                (id, name, author_id, status, need_more_reviewers, created_at, merged_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pr.id)
        .bind(&pr.name)
        .bind(&pr.author.id)
        .bind(pr.status.to_string())
        .bind(pr.need_more_reviewers)
        .bind(pr.created_at.timestamp_millis())
        .bind(pr.merged_at.map(|t| t.timestamp_millis()))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::already_exists("pull request", pr.id.clone())
            } else if is_foreign_key_violation(&e) {
                StoreError::not_found("user", pr.author.id.clone())
            } else {
                StoreError::Database(e)
            }
        })?;

        write_reviewers(&mut tx, &pr.id, &pr.reviewers).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_pr(&self, id: &str, pr: &PullRequest) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE pull_requests
            SET name = ?,
                status = ?,
                need_more_reviewers = ?,
                merged_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&pr.name)
        .bind(pr.status.to_string())
        .bind(pr.need_more_reviewers)
        .bind(pr.merged_at.map(|t| t.timestamp_millis()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("pull request", id));
        }

        write_reviewers(&mut tx, id, &pr.reviewers).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user_prs(
        &self,
        user_id: &str,
        only_open: bool,
    ) -> Result<Vec<PullRequest>, StoreError> {
        let rows = sqlx::query_as::<_, PrRow>(&format!(
            r#"
            SELECT {}
            FROM pull_requests p
            JOIN pull_request_reviewers r ON r.pr_id = p.id
            WHERE r.user_id = ? AND (? = 0 OR p.status = 'OPEN')
            ORDER BY p.created_at DESC, p.id
            "#,
            PR_COLUMNS
        ))
        .bind(user_id)
        .bind(only_open)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn get_team_prs(&self, team_id: TeamId) -> Result<Vec<PullRequest>, StoreError> {
        let rows = sqlx::query_as::<_, PrRow>(&format!(
            r#"
            SELECT {}
            FROM pull_requests p
            WHERE p.author_id IN (SELECT id FROM users WHERE team_id = ?)
               OR p.id IN (
                   SELECT r.pr_id
                   FROM pull_request_reviewers r
                   JOIN users u ON u.id = r.user_id
                   WHERE u.team_id = ?
               )
            ORDER BY p.created_at DESC, p.id
            "#,
            PR_COLUMNS
        ))
        .bind(team_id)
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn remove_reviewer_from_all_open_prs(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let affected: Vec<(String,)> = sqlx::query_as(
            r#"
            UPDATE pull_requests
            SET need_more_reviewers = 1
            WHERE status = 'OPEN'
              AND id IN (SELECT pr_id FROM pull_request_reviewers WHERE user_id = ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM pull_request_reviewers
            WHERE user_id = ?
              AND pr_id IN (SELECT id FROM pull_requests WHERE status = 'OPEN')
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut ids: Vec<String> = affected.into_iter().map(|(id,)| id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn add_reviewer_to_pr(&self, pr_id: &str, user_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO pull_request_reviewers (pr_id, user_id, position)
            SELECT p.id, ?, COALESCE(
                (SELECT MAX(position) + 1 FROM pull_request_reviewers WHERE pr_id = p.id),
                0
            )
            FROM pull_requests p
            WHERE p.id = ? AND p.author_id != ?
            "#,
        )
        .bind(user_id)
        .bind(pr_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::not_found("user", user_id)
            } else {
                StoreError::Database(e)
            }
        })?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM pull_requests WHERE id = ?")
                .bind(pr_id)
                .fetch_optional(&self.pool)
                .await?;
            if exists.is_none() {
                return Err(StoreError::not_found("pull request", pr_id));
            }
        }
        Ok(())
    }

    async fn review_stats(&self) -> Result<ReviewStats, StoreError> {
        let per_user: Vec<(String, i64)> = sqlx::query_as(
            "SELECT user_id, COUNT(*) FROM pull_request_reviewers GROUP BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let per_pr: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, COUNT(r.user_id)
            FROM pull_requests p
            LEFT JOIN pull_request_reviewers r ON r.pr_id = p.id
            GROUP BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ReviewStats {
            reviews_per_user: per_user
                .into_iter()
                .map(|(id, n)| (id, n as u64))
                .collect(),
            reviewers_per_pr: per_pr.into_iter().map(|(id, n)| (id, n as u64)).collect(),
        })
    }
}
