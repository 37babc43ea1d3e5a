//! Row model for the `actions` table.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use dbpulse_core::action::{Action, ActionStatus};

use super::RowConversionError;

/// One row of the `actions` table.
#[derive(Debug, Clone, FromRow)]
pub struct ActionRow {
    pub id: String,
    pub detection_id: String,
    pub detection_key: String,
    pub action_type: String,
    pub database_id: String,
    pub status: String,
    pub message: String,
    pub error: Option<String>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActionRow {
    pub fn into_action(self) -> Result<Action, RowConversionError> {
        let status = parse_status(&self.status).ok_or_else(|| RowConversionError {
            id: self.id.clone(),
            column: "status",
            value: self.status.clone(),
        })?;

        Ok(Action {
            id: self.id,
            detection_id: self.detection_id,
            detection_key: self.detection_key,
            action_type: self.action_type,
            database_id: self.database_id,
            status,
            message: self.message,
            error: self.error,
            result: self.result,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

fn parse_status(value: &str) -> Option<ActionStatus> {
    match value {
        "queued" => Some(ActionStatus::Queued),
        "executing" => Some(ActionStatus::Executing),
        "completed" => Some(ActionStatus::Completed),
        "failed" => Some(ActionStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_action() {
        let row = ActionRow {
            id: "action-1".into(),
            detection_id: "det-1".into(),
            detection_key: "db-1:missing_index:users.email".into(),
            action_type: "create_index".into(),
            database_id: "db-1".into(),
            status: "executing".into(),
            message: String::new(),
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        };
        let action = row.into_action().unwrap();
        assert_eq!(action.status, ActionStatus::Executing);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let row = ActionRow {
            id: "action-1".into(),
            detection_id: "det-1".into(),
            detection_key: "k".into(),
            action_type: "create_index".into(),
            database_id: "db-1".into(),
            status: "paused".into(),
            message: String::new(),
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert_eq!(row.into_action().unwrap_err().column, "status");
    }
}
