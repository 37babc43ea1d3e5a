//! Verification of completed remediation actions.
//!
//! After the executor reports an action completed, the tracker watches
//! subsequent snapshots and re-runs the originating detector. If the fault
//! clears, the detection is resolved; if it survives the configured number
//! of cycles, the detection stays active and a rollback is requested.
//!
//! One pending entry per dedup key, guarded by a single async mutex so
//! replace-on-completion and countdown-on-snapshot are linearizable per key.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use dbpulse_core::action::ActionStatus;
use dbpulse_core::snapshot::NormalizedSnapshot;
use dbpulse_core::types::UnixSeconds;
use dbpulse_events::{ActionCompleted, AnalysisEvent, CompletionStatus, EventBus, RollbackRequest};
use dbpulse_knowledge::{KnowledgeStore, ResolveOutcome};

use crate::engine::DetectionEngine;

/// Whether an action type's effect can be confirmed by watching metrics.
///
/// Infrastructure deployments change the topology rather than the observed
/// database, so their originating detector keeps firing regardless of
/// success; those are resolved on completion instead of being watched.
/// Unknown action types are conservatively treated the same way as
/// unverifiable, except they are *not* auto-resolved either — see
/// [`VerificationTracker::on_action_completed`].
pub fn supports_verification(action_type: &str) -> bool {
    matches!(
        action_type,
        "create_index" | "tune_config_high_latency" | "cache_optimization_recommendation"
    )
}

/// A completed action awaiting confirmation that its fault cleared.
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub action_id: String,
    pub detection_id: String,
    pub detection_key: String,
    pub action_type: String,
    pub database_id: String,
    /// Name of the detector that raised the original detection, re-run on
    /// every snapshot to check whether the fault persists.
    pub detector_name: String,
    /// Solution text to stamp on the record when the fault clears.
    pub solution: String,
    /// Snapshots left before the verification window is exhausted.
    pub remaining_cycles: u32,
    /// Executor-reported completion time; enforces last-remediation-wins
    /// against out-of-order event delivery.
    pub reported_at: UnixSeconds,
}

/// Tracks completed actions until their effect is confirmed or disproven.
pub struct VerificationTracker {
    knowledge: Arc<dyn KnowledgeStore>,
    bus: Arc<EventBus>,
    /// Pending entries by dedup key.
    pending: Mutex<HashMap<String, PendingVerification>>,
    verification_cycles: u32,
}

impl VerificationTracker {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        bus: Arc<EventBus>,
        verification_cycles: u32,
    ) -> Self {
        Self {
            knowledge,
            bus,
            pending: Mutex::new(HashMap::new()),
            verification_cycles,
        }
    }

    /// Number of entries currently awaiting verification.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether a dedup key has a pending verification.
    pub async fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().await.contains_key(key)
    }

    /// Handle an `actions.completed` event.
    ///
    /// Updates the action bookkeeping, then either resolves immediately
    /// (unverifiable action types) or starts the verification countdown.
    pub async fn on_action_completed(&self, event: &ActionCompleted) {
        let status = match event.status {
            CompletionStatus::Completed => ActionStatus::Completed,
            CompletionStatus::Failed => ActionStatus::Failed,
        };
        match self
            .knowledge
            .update_action_status(&event.action_id, status, &event.message, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    action_id = %event.action_id,
                    status = status.as_str(),
                    "Ignored action status update (unknown action or backwards transition)"
                );
            }
            Err(e) => {
                tracing::warn!(
                    action_id = %event.action_id,
                    error = %e,
                    "Failed to update action status"
                );
            }
        }

        if event.status != CompletionStatus::Completed {
            tracing::debug!(
                action_id = %event.action_id,
                detection_key = %event.detection_key,
                "Action failed, nothing to verify"
            );
            return;
        }

        if !supports_verification(&event.action_type) {
            // Last remediation wins here too: a newer unverifiable action
            // moots any tracked countdown for the key, and a stale one must
            // not resolve a detection a newer action is verifying.
            {
                let mut pending = self.pending.lock().await;
                if let Some(existing) = pending.get(&event.detection_key) {
                    if event.timestamp < existing.reported_at {
                        tracing::debug!(
                            detection_key = %event.detection_key,
                            stale_action = %event.action_id,
                            tracked_action = %existing.action_id,
                            "Dropped stale completion event"
                        );
                        return;
                    }
                    let superseded = pending.remove(&event.detection_key);
                    if let Some(superseded) = superseded {
                        tracing::debug!(
                            detection_key = %event.detection_key,
                            superseded_action = %superseded.action_id,
                            "Newer remediation superseded the pending verification"
                        );
                    }
                }
            }
            self.resolve(&event.detection_id, &event.solution).await;
            tracing::info!(
                detection_id = %event.detection_id,
                action_type = %event.action_type,
                "Unverifiable action completed, resolved on completion"
            );
            return;
        }

        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.get(&event.detection_key) {
            // Last remediation wins, by payload timestamp not delivery order.
            if event.timestamp < existing.reported_at {
                tracing::debug!(
                    detection_key = %event.detection_key,
                    stale_action = %event.action_id,
                    tracked_action = %existing.action_id,
                    "Dropped stale completion event"
                );
                return;
            }
        }

        let detector_name = detector_name_from_key(&event.detection_key, &event.database_id);
        pending.insert(
            event.detection_key.clone(),
            PendingVerification {
                action_id: event.action_id.clone(),
                detection_id: event.detection_id.clone(),
                detection_key: event.detection_key.clone(),
                action_type: event.action_type.clone(),
                database_id: event.database_id.clone(),
                detector_name,
                solution: event.solution.clone(),
                remaining_cycles: self.verification_cycles,
                reported_at: event.timestamp,
            },
        );
        tracing::info!(
            detection_key = %event.detection_key,
            action_id = %event.action_id,
            cycles = self.verification_cycles,
            "Verification started"
        );
    }

    /// Re-evaluate every pending verification for the snapshot's database.
    pub async fn on_snapshot(&self, engine: &DetectionEngine, snapshot: &NormalizedSnapshot) {
        let mut pending = self.pending.lock().await;

        let keys: Vec<String> = pending
            .values()
            .filter(|entry| entry.database_id == snapshot.database_id)
            .map(|entry| entry.detection_key.clone())
            .collect();

        for key in keys {
            let Some(entry) = pending.get_mut(&key) else {
                continue;
            };

            let Some(detector) = engine.get(&entry.detector_name) else {
                tracing::warn!(
                    detection_key = %key,
                    detector = %entry.detector_name,
                    "Originating detector is not registered, dropping verification"
                );
                pending.remove(&key);
                continue;
            };

            let still_firing = detector.evaluate(snapshot).is_some();

            if !still_firing {
                let entry = pending.remove(&key);
                if let Some(entry) = entry {
                    tracing::info!(
                        detection_id = %entry.detection_id,
                        detection_key = %key,
                        "Fault cleared, resolving detection"
                    );
                    self.resolve(&entry.detection_id, &entry.solution).await;
                }
                continue;
            }

            if entry.remaining_cycles > 0 {
                entry.remaining_cycles -= 1;
                tracing::debug!(
                    detection_key = %key,
                    remaining = entry.remaining_cycles,
                    "Fault still present, verification continues"
                );
                continue;
            }

            // Exhausted: the detection stays active, escalate.
            let entry = pending.remove(&key);
            if let Some(entry) = entry {
                tracing::warn!(
                    detection_id = %entry.detection_id,
                    action_id = %entry.action_id,
                    "Verification window exhausted, requesting rollback"
                );
                self.bus
                    .publish(AnalysisEvent::RollbackRequested(RollbackRequest {
                        action_id: entry.action_id,
                        detection_id: entry.detection_id,
                        action_type: entry.action_type,
                        database_id: entry.database_id,
                        reason: "fault persisted through the verification window".into(),
                        timestamp: snapshot.timestamp,
                    }));
            }
        }
    }

    async fn resolve(&self, detection_id: &str, solution: &str) {
        match self.knowledge.resolve(detection_id, solution).await {
            Ok(ResolveOutcome::Resolved) => {}
            Ok(ResolveOutcome::NotFound) => {
                tracing::debug!(
                    detection_id = %detection_id,
                    "Resolve was a no-op, record already gone"
                );
            }
            Err(e) => {
                tracing::warn!(
                    detection_id = %detection_id,
                    error = %e,
                    "Failed to resolve detection"
                );
            }
        }
    }
}

/// Extract the detector name from a dedup key `database:detector:resource`.
///
/// The database id is stripped by length rather than split on `:` so ids
/// containing colons do not shift the detector segment.
fn detector_name_from_key(key: &str, database_id: &str) -> String {
    match key.strip_prefix(database_id).and_then(|r| r.strip_prefix(':')) {
        Some(rest) => rest.split(':').next().unwrap_or(rest).to_string(),
        None => {
            tracing::debug!(
                key = %key,
                database_id = %database_id,
                "Detection key is not prefixed by the event's database id"
            );
            key.split(':').next().unwrap_or(key).to_string()
        }
    }
}
