//! PostgreSQL-backed knowledge store.
//!
//! Dedup atomicity rests on the partial unique index
//! `uq_detections_active_key` (one active row per key): racing inserts lose
//! with a 23505 unique violation, which degenerates into a `last_seen`
//! refresh of the record the winner created.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use dbpulse_core::action::{Action, ActionStatus};
use dbpulse_core::detection::{Detection, DetectionRecord};
use dbpulse_db::repositories::{ActionRepo, DetectionRepo};
use dbpulse_db::DbPool;

use crate::store::{KnowledgeStore, RegisterOutcome, ResolveOutcome};
use crate::{KnowledgeError, DEFAULT_AUDIT_TTL_SECS};

/// Knowledge store backed by PostgreSQL.
pub struct PgKnowledge {
    pool: DbPool,
    audit_ttl: Duration,
}

impl PgKnowledge {
    pub fn new(pool: DbPool, audit_ttl: Duration) -> Self {
        Self { pool, audit_ttl }
    }

    pub fn with_default_ttl(pool: DbPool) -> Self {
        Self::new(pool, Duration::seconds(DEFAULT_AUDIT_TTL_SECS))
    }

    /// Insert an active record, falling back to a refresh when a concurrent
    /// registration won the unique-index race.
    async fn insert_or_refresh(
        &self,
        detection: &Detection,
    ) -> Result<RegisterOutcome, KnowledgeError> {
        let now = Utc::now();
        match DetectionRepo::insert_active(&self.pool, detection, now).await {
            Ok(row) => Ok(RegisterOutcome {
                accepted: true,
                detection_id: row.id,
                superseded: None,
            }),
            Err(e) if is_unique_violation(&e) => {
                match DetectionRepo::refresh_last_seen(&self.pool, &detection.key, now).await? {
                    Some(existing_id) => Ok(RegisterOutcome {
                        accepted: false,
                        detection_id: existing_id,
                        superseded: None,
                    }),
                    // The winner resolved before our refresh landed; report
                    // the dedup hit without a surviving record id.
                    None => {
                        tracing::warn!(
                            key = %detection.key,
                            "Lost registration race and the winning record is already gone"
                        );
                        Ok(RegisterOutcome {
                            accepted: false,
                            detection_id: detection.id.clone(),
                            superseded: None,
                        })
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KnowledgeStore for PgKnowledge {
    async fn register(&self, detection: Detection) -> Result<RegisterOutcome, KnowledgeError> {
        let now = Utc::now();

        if let Some(row) = DetectionRepo::find_active_by_key(&self.pool, &detection.key).await? {
            let existing = row.into_record()?;

            if detection.severity > existing.detection.severity {
                DetectionRepo::supersede(
                    &self.pool,
                    &existing.detection.id,
                    now + self.audit_ttl,
                )
                .await?;
                let mut outcome = self.insert_or_refresh(&detection).await?;
                if outcome.accepted {
                    outcome.superseded = Some(existing.detection.id);
                }
                return Ok(outcome);
            }

            if let Some(existing_id) =
                DetectionRepo::refresh_last_seen(&self.pool, &detection.key, now).await?
            {
                return Ok(RegisterOutcome {
                    accepted: false,
                    detection_id: existing_id,
                    superseded: None,
                });
            }
            // The record we just saw was resolved concurrently; fall through
            // to a fresh insert.
        }

        self.insert_or_refresh(&detection).await
    }

    async fn active_id(&self, key: &str) -> Result<Option<String>, KnowledgeError> {
        let row = DetectionRepo::find_active_by_key(&self.pool, key).await?;
        Ok(row.map(|r| r.id))
    }

    async fn list_active(
        &self,
        database_id: &str,
    ) -> Result<Vec<DetectionRecord>, KnowledgeError> {
        let rows = DetectionRepo::list_active(&self.pool, database_id).await?;
        rows.into_iter()
            .map(|row| row.into_record().map_err(KnowledgeError::from))
            .collect()
    }

    async fn resolve(
        &self,
        detection_id: &str,
        solution: &str,
    ) -> Result<ResolveOutcome, KnowledgeError> {
        let expires_at = Utc::now() + self.audit_ttl;
        let resolved =
            DetectionRepo::resolve(&self.pool, detection_id, solution, expires_at).await?;
        Ok(if resolved {
            ResolveOutcome::Resolved
        } else {
            ResolveOutcome::NotFound
        })
    }

    async fn register_action(&self, action: Action) -> Result<(), KnowledgeError> {
        ActionRepo::insert(&self.pool, &action).await?;
        Ok(())
    }

    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
        message: &str,
        error: Option<&str>,
    ) -> Result<bool, KnowledgeError> {
        let updated =
            ActionRepo::update_status(&self.pool, action_id, status, message, error, Utc::now())
                .await?;
        Ok(updated)
    }

    async fn pending_actions(&self, database_id: &str) -> Result<Vec<Action>, KnowledgeError> {
        let rows = ActionRepo::list_pending(&self.pool, database_id).await?;
        rows.into_iter()
            .map(|row| row.into_action().map_err(KnowledgeError::from))
            .collect()
    }

    async fn purge_expired(&self) -> Result<u64, KnowledgeError> {
        let purged = DetectionRepo::delete_expired(&self.pool, Utc::now()).await?;
        Ok(purged)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
