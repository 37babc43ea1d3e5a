//! The knowledge store trait and operation outcomes.

use async_trait::async_trait;

use dbpulse_core::action::{Action, ActionStatus};
use dbpulse_core::detection::{Detection, DetectionRecord};

use crate::KnowledgeError;

/// Result of registering a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// True when a new active record was created; false when the detection
    /// was a duplicate of an existing active record (which had its
    /// `last_seen` refreshed instead).
    pub accepted: bool,
    /// Id of the active record for the key after this call. On a dedup hit
    /// this is the *existing* record's id, not the incoming detection's.
    pub detection_id: String,
    /// Id of the lower-severity record this registration superseded, if any.
    pub superseded: Option<String>,
}

/// Result of resolving a detection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    /// The record does not exist or is already terminal. A no-op, not an
    /// error: completion events may outlive the records they reference.
    NotFound,
}

/// Lifecycle operations over detection records and remediation actions.
///
/// All operations are safe to call concurrently; `register` in particular
/// guarantees that racing registrations under the same key produce exactly
/// one active record.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Register a detection under its dedup key.
    ///
    /// Creates an active record when none exists for the key; refreshes
    /// `last_seen` on the existing record otherwise. A strictly more severe
    /// detection supersedes the existing record and becomes the new active
    /// one.
    async fn register(&self, detection: Detection) -> Result<RegisterOutcome, KnowledgeError>;

    /// Id of the active record for a dedup key, if one exists.
    async fn active_id(&self, key: &str) -> Result<Option<String>, KnowledgeError>;

    /// All active records for a database, newest first.
    async fn list_active(&self, database_id: &str)
        -> Result<Vec<DetectionRecord>, KnowledgeError>;

    /// Transition an active record to resolved, stamping the solution text
    /// and starting the audit retention clock.
    async fn resolve(
        &self,
        detection_id: &str,
        solution: &str,
    ) -> Result<ResolveOutcome, KnowledgeError>;

    /// Record a remediation action.
    async fn register_action(&self, action: Action) -> Result<(), KnowledgeError>;

    /// Advance an action's status. Returns false when the action is unknown
    /// or the transition would move backwards.
    async fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
        message: &str,
        error: Option<&str>,
    ) -> Result<bool, KnowledgeError>;

    /// Queued and executing actions for a database, oldest first.
    async fn pending_actions(&self, database_id: &str) -> Result<Vec<Action>, KnowledgeError>;

    /// Delete terminal records whose audit window has elapsed. Returns the
    /// number purged.
    async fn purge_expired(&self) -> Result<u64, KnowledgeError>;
}
