//! Repository for the `actions` table.
//!
//! Status transitions are forward-only; the WHERE clause in
//! [`ActionRepo::update_status`] makes regressions a no-op at the database
//! level rather than trusting callers.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use dbpulse_core::action::{Action, ActionStatus};

use crate::models::ActionRow;

/// Column list for `actions` queries.
const COLUMNS: &str = "\
    id, detection_id, detection_key, action_type, database_id, \
    status, message, error, result, created_at, started_at, completed_at";

/// Rank expression mirroring `ActionStatus::rank` for transition guards.
const RANK_CASE: &str =
    "CASE status WHEN 'queued' THEN 0 WHEN 'executing' THEN 1 ELSE 2 END";

/// Provides persistence operations for remediation actions.
pub struct ActionRepo;

impl ActionRepo {
    /// Insert a new action row.
    pub async fn insert(pool: &PgPool, action: &Action) -> Result<ActionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO actions \
                (id, detection_id, detection_key, action_type, database_id, \
                 status, message, error, result, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActionRow>(&query)
            .bind(&action.id)
            .bind(&action.detection_id)
            .bind(&action.detection_key)
            .bind(&action.action_type)
            .bind(&action.database_id)
            .bind(action.status.as_str())
            .bind(&action.message)
            .bind(&action.error)
            .bind(&action.result)
            .bind(action.created_at)
            .fetch_one(pool)
            .await
    }

    /// Advance an action's status, stamping started/completed timestamps.
    ///
    /// Returns false when the action does not exist or the transition would
    /// move backwards (forward-only invariant).
    pub async fn update_status(
        pool: &PgPool,
        action_id: &str,
        status: ActionStatus,
        message: &str,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE actions SET \
                status = $2, \
                message = $3, \
                error = COALESCE($4, error), \
                started_at = CASE WHEN $2 = 'executing' THEN $5 ELSE started_at END, \
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN $5 \
                               ELSE completed_at END \
             WHERE id = $1 AND {RANK_CASE} < $6"
        );
        let result = sqlx::query(&query)
            .bind(action_id)
            .bind(status.as_str())
            .bind(message)
            .bind(error)
            .bind(now)
            .bind(status.rank() as i32)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a single action by id.
    pub async fn get_by_id(pool: &PgPool, action_id: &str) -> Result<Option<ActionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM actions WHERE id = $1");
        sqlx::query_as::<_, ActionRow>(&query)
            .bind(action_id)
            .fetch_optional(pool)
            .await
    }

    /// List queued and executing actions for a database, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        database_id: &str,
    ) -> Result<Vec<ActionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM actions \
             WHERE database_id = $1 AND status IN ('queued', 'executing') \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, ActionRow>(&query)
            .bind(database_id)
            .fetch_all(pool)
            .await
    }
}
