//! In-memory knowledge store.
//!
//! Single-map implementation guarded by one mutex; the lock scope of each
//! operation is the atomicity boundary, so racing registrations under the
//! same key serialize naturally. Used by tests and database-less runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use dbpulse_core::action::{Action, ActionStatus};
use dbpulse_core::detection::{Detection, DetectionRecord, DetectionState};
use dbpulse_core::types::Timestamp;

use crate::store::{KnowledgeStore, RegisterOutcome, ResolveOutcome};
use crate::{KnowledgeError, DEFAULT_AUDIT_TTL_SECS};

struct StoredRecord {
    record: DetectionRecord,
    /// Set when the record turns terminal; drives the audit purge.
    expires_at: Option<Timestamp>,
}

#[derive(Default)]
struct Inner {
    /// All records by detection id, terminal ones included until purged.
    records: HashMap<String, StoredRecord>,
    /// Dedup index: key -> id of the single active record.
    active_by_key: HashMap<String, String>,
    actions: HashMap<String, Action>,
}

/// Knowledge store backed by process memory.
pub struct MemoryKnowledge {
    inner: Mutex<Inner>,
    audit_ttl: Duration,
}

impl MemoryKnowledge {
    pub fn new(audit_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            audit_ttl,
        }
    }

    /// Fetch a record by id, terminal states included.
    pub async fn get(&self, detection_id: &str) -> Option<DetectionRecord> {
        let inner = self.inner.lock().await;
        inner
            .records
            .get(detection_id)
            .map(|stored| stored.record.clone())
    }
}

impl Default for MemoryKnowledge {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_AUDIT_TTL_SECS))
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledge {
    async fn register(&self, detection: Detection) -> Result<RegisterOutcome, KnowledgeError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let existing = inner
            .active_by_key
            .get(&detection.key)
            .cloned()
            .and_then(|id| {
                let severity = inner.records.get(&id).map(|s| s.record.detection.severity);
                severity.map(|severity| (id, severity))
            });

        if let Some((active_id, existing_severity)) = existing {
            if detection.severity > existing_severity {
                // Stricter condition replaces the active record.
                if let Some(old) = inner.records.get_mut(&active_id) {
                    old.record.state = DetectionState::Superseded;
                    old.expires_at = Some(now + self.audit_ttl);
                }
                let id = detection.id.clone();
                inner.active_by_key.insert(detection.key.clone(), id.clone());
                inner.records.insert(
                    id.clone(),
                    StoredRecord {
                        record: DetectionRecord {
                            detection,
                            state: DetectionState::Active,
                            resolved_by: None,
                            last_seen: now,
                        },
                        expires_at: None,
                    },
                );
                return Ok(RegisterOutcome {
                    accepted: true,
                    detection_id: id,
                    superseded: Some(active_id),
                });
            }

            if let Some(existing) = inner.records.get_mut(&active_id) {
                existing.record.last_seen = now;
            }
            return Ok(RegisterOutcome {
                accepted: false,
                detection_id: active_id,
                superseded: None,
            });
        }

        let id = detection.id.clone();
        inner.active_by_key.insert(detection.key.clone(), id.clone());
        inner.records.insert(
            id.clone(),
            StoredRecord {
                record: DetectionRecord {
                    detection,
                    state: DetectionState::Active,
                    resolved_by: None,
                    last_seen: now,
                },
                expires_at: None,
            },
        );
        Ok(RegisterOutcome {
            accepted: true,
            detection_id: id,
            superseded: None,
        })
    }

    async fn active_id(&self, key: &str) -> Result<Option<String>, KnowledgeError> {
        let inner = self.inner.lock().await;
        Ok(inner.active_by_key.get(key).cloned())
    }

    async fn list_active(
        &self,
        database_id: &str,
    ) -> Result<Vec<DetectionRecord>, KnowledgeError> {
        let inner = self.inner.lock().await;
        let mut records: Vec<DetectionRecord> = inner
            .records
            .values()
            .filter(|stored| {
                stored.record.state == DetectionState::Active
                    && stored.record.detection.database_id == database_id
            })
            .map(|stored| stored.record.clone())
            .collect();
        records.sort_by(|a, b| b.detection.timestamp.cmp(&a.detection.timestamp));
        Ok(records)
    }

    async fn resolve(
        &self,
        detection_id: &str,
        solution: &str,
    ) -> Result<ResolveOutcome, KnowledgeError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let expires_at = now + self.audit_ttl;

        let Some(stored) = inner.records.get_mut(detection_id) else {
            return Ok(ResolveOutcome::NotFound);
        };
        if stored.record.state != DetectionState::Active {
            return Ok(ResolveOutcome::NotFound);
        }

        stored.record.state = DetectionState::Resolved;
        stored.record.resolved_by = Some(solution.to_string());
        stored.expires_at = Some(expires_at);
        let key = stored.record.detection.key.clone();

        // Drop the dedup index entry only if it still points at this record;
        // it may already point at a superseding one.
        if inner.active_by_key.get(&key).map(String::as_str) == Some(detection_id) {
            inner.active_by_key.remove(&key);
        }
        Ok(ResolveOutcome::Resolved)
    }

    async fn register_action(&self, action: Action) -> Result<(), KnowledgeError> {
        let mut inner = self.inner.lock().await;
        inner.actions.insert(action.id.clone(), action);
        Ok(())
    }

    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
        message: &str,
        error: Option<&str>,
    ) -> Result<bool, KnowledgeError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let Some(action) = inner.actions.get_mut(action_id) else {
            return Ok(false);
        };
        if !action.status.can_transition_to(status) {
            return Ok(false);
        }

        action.status = status;
        action.message = message.to_string();
        if let Some(error) = error {
            action.error = Some(error.to_string());
        }
        match status {
            ActionStatus::Executing => action.started_at = Some(now),
            ActionStatus::Completed | ActionStatus::Failed => action.completed_at = Some(now),
            ActionStatus::Queued => {}
        }
        Ok(true)
    }

    async fn pending_actions(&self, database_id: &str) -> Result<Vec<Action>, KnowledgeError> {
        let inner = self.inner.lock().await;
        let mut actions: Vec<Action> = inner
            .actions
            .values()
            .filter(|a| a.database_id == database_id && a.status.is_pending())
            .cloned()
            .collect();
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(actions)
    }

    async fn purge_expired(&self) -> Result<u64, KnowledgeError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let before = inner.records.len();
        inner
            .records
            .retain(|_, stored| match stored.expires_at {
                Some(expires_at) => expires_at > now,
                None => true,
            });
        Ok((before - inner.records.len()) as u64)
    }
}
