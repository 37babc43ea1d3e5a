//! Repository for the `detections` table.
//!
//! The dedup invariant (at most one active record per key) is enforced by
//! the partial unique index `uq_detections_active_key`; the knowledge layer
//! maps the resulting constraint violation into a last-seen refresh.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use dbpulse_core::detection::Detection;

use crate::models::DetectionRow;

/// Column list for `detections` queries.
const COLUMNS: &str = "\
    id, key, detector_name, category, severity, database_id, raised_at, \
    title, description, evidence, recommendation, action_type, action_metadata, \
    state, resolved_by, created_at, last_seen, expires_at";

/// Provides persistence operations for detection records.
pub struct DetectionRepo;

impl DetectionRepo {
    /// Insert a new active record for the detection.
    ///
    /// Fails with a unique-constraint violation (PostgreSQL code 23505,
    /// constraint `uq_detections_active_key`) when an active record already
    /// exists for the key — callers treat that as "lost the race, refresh".
    pub async fn insert_active(
        pool: &PgPool,
        detection: &Detection,
        now: DateTime<Utc>,
    ) -> Result<DetectionRow, sqlx::Error> {
        let evidence = serde_json::Value::Object(
            detection
                .evidence
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let action_metadata = serde_json::Value::Object(
            detection
                .action_metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let query = format!(
            "INSERT INTO detections \
                (id, key, detector_name, category, severity, database_id, raised_at, \
                 title, description, evidence, recommendation, action_type, \
                 action_metadata, state, created_at, last_seen) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                     'active', $14, $14) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DetectionRow>(&query)
            .bind(&detection.id)
            .bind(&detection.key)
            .bind(&detection.detector_name)
            .bind(detection.category.as_str())
            .bind(detection.severity.as_str())
            .bind(&detection.database_id)
            .bind(detection.timestamp)
            .bind(&detection.title)
            .bind(&detection.description)
            .bind(&evidence)
            .bind(&detection.recommendation)
            .bind(&detection.action_type)
            .bind(&action_metadata)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Find the active record for a dedup key, if any.
    pub async fn find_active_by_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<DetectionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM detections WHERE key = $1 AND state = 'active'");
        sqlx::query_as::<_, DetectionRow>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Refresh `last_seen` on the active record for a key.
    ///
    /// Returns the record id when an active record existed.
    pub async fn refresh_last_seen(
        pool: &PgPool,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "UPDATE detections SET last_seen = $2 \
             WHERE key = $1 AND state = 'active' \
             RETURNING id",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    /// Transition an active record to resolved, stamping the solution and
    /// the audit expiry. Returns false when the record was not active.
    pub async fn resolve(
        pool: &PgPool,
        detection_id: &str,
        solution: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE detections \
             SET state = 'resolved', resolved_by = $2, expires_at = $3 \
             WHERE id = $1 AND state = 'active'",
        )
        .bind(detection_id)
        .bind(solution)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an active record superseded by a stricter detection.
    pub async fn supersede(
        pool: &PgPool,
        detection_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE detections SET state = 'superseded', expires_at = $2 \
             WHERE id = $1 AND state = 'active'",
        )
        .bind(detection_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all active records for a database, newest first.
    pub async fn list_active(
        pool: &PgPool,
        database_id: &str,
    ) -> Result<Vec<DetectionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM detections \
             WHERE database_id = $1 AND state = 'active' \
             ORDER BY raised_at DESC"
        );
        sqlx::query_as::<_, DetectionRow>(&query)
            .bind(database_id)
            .fetch_all(pool)
            .await
    }

    /// Purge terminal records whose audit window has elapsed.
    ///
    /// Returns the number of rows deleted. Active records are never touched
    /// (their `expires_at` is NULL).
    pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM detections WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
