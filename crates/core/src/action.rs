//! Remediation action bookkeeping types.
//!
//! Actions are created by the remediation actor and tracked by the knowledge
//! store. Status moves forward only: `Queued → Executing → Completed|Failed`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Timestamp;

/// Lifecycle status of a remediation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Queued,
    Executing,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Queued => "queued",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }

    /// Position in the forward-only lifecycle. Terminal states share a rank:
    /// neither can replace the other.
    pub fn rank(&self) -> u8 {
        match self {
            ActionStatus::Queued => 0,
            ActionStatus::Executing => 1,
            ActionStatus::Completed | ActionStatus::Failed => 2,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Whether the action is still awaiting execution or mid-flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionStatus::Queued | ActionStatus::Executing)
    }
}

/// A remediation action and its execution bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub detection_id: String,
    pub detection_key: String,
    pub action_type: String,
    pub database_id: String,
    pub status: ActionStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Action {
    /// Create a queued action for a detection.
    pub fn queued(
        detection_id: &str,
        detection_key: &str,
        action_type: &str,
        database_id: &str,
    ) -> Self {
        Self {
            id: format!("action-{}", Uuid::new_v4()),
            detection_id: detection_id.to_string(),
            detection_key: detection_key.to_string(),
            action_type: action_type.to_string(),
            database_id: database_id.to_string(),
            status: ActionStatus::Queued,
            message: String::new(),
            error: None,
            result: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_move_forward_only() {
        assert!(ActionStatus::Queued.can_transition_to(ActionStatus::Executing));
        assert!(ActionStatus::Queued.can_transition_to(ActionStatus::Completed));
        assert!(ActionStatus::Executing.can_transition_to(ActionStatus::Failed));

        assert!(!ActionStatus::Executing.can_transition_to(ActionStatus::Queued));
        assert!(!ActionStatus::Completed.can_transition_to(ActionStatus::Executing));
        assert!(!ActionStatus::Completed.can_transition_to(ActionStatus::Failed));
        assert!(!ActionStatus::Failed.can_transition_to(ActionStatus::Completed));
    }

    #[test]
    fn pending_statuses() {
        assert!(ActionStatus::Queued.is_pending());
        assert!(ActionStatus::Executing.is_pending());
        assert!(!ActionStatus::Completed.is_pending());
        assert!(!ActionStatus::Failed.is_pending());
    }

    #[test]
    fn queued_action_has_unique_id() {
        let a = Action::queued("det-1", "db:cache:cache", "deploy_redis", "db-1");
        let b = Action::queued("det-1", "db:cache:cache", "deploy_redis", "db-1");
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ActionStatus::Queued);
        assert!(a.started_at.is_none());
    }
}
