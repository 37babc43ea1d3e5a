//! Row model for the `detections` table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use dbpulse_core::detection::{
    Detection, DetectionCategory, DetectionRecord, DetectionSeverity, DetectionState,
};

use super::RowConversionError;

/// One row of the `detections` table.
#[derive(Debug, Clone, FromRow)]
pub struct DetectionRow {
    pub id: String,
    pub key: String,
    pub detector_name: String,
    pub category: String,
    pub severity: String,
    pub database_id: String,
    pub raised_at: i64,
    pub title: String,
    pub description: String,
    pub evidence: serde_json::Value,
    pub recommendation: String,
    pub action_type: Option<String>,
    pub action_metadata: serde_json::Value,
    pub state: String,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DetectionRow {
    /// Convert the row into the domain record.
    pub fn into_record(self) -> Result<DetectionRecord, RowConversionError> {
        let state = DetectionState::parse(&self.state).ok_or_else(|| RowConversionError {
            id: self.id.clone(),
            column: "state",
            value: self.state.clone(),
        })?;
        let category = parse_category(&self.category).ok_or_else(|| RowConversionError {
            id: self.id.clone(),
            column: "category",
            value: self.category.clone(),
        })?;
        let severity = parse_severity(&self.severity).ok_or_else(|| RowConversionError {
            id: self.id.clone(),
            column: "severity",
            value: self.severity.clone(),
        })?;

        let detection = Detection {
            id: self.id,
            key: self.key,
            detector_name: self.detector_name,
            category,
            severity,
            database_id: self.database_id,
            timestamp: self.raised_at,
            title: self.title,
            description: self.description,
            evidence: json_object_to_map(self.evidence),
            recommendation: self.recommendation,
            action_type: self.action_type,
            action_metadata: json_object_to_map(self.action_metadata),
        };

        Ok(DetectionRecord {
            detection,
            state,
            resolved_by: self.resolved_by,
            last_seen: self.last_seen,
        })
    }
}

fn parse_category(value: &str) -> Option<DetectionCategory> {
    match value {
        "query" => Some(DetectionCategory::Query),
        "connection" => Some(DetectionCategory::Connection),
        "cache" => Some(DetectionCategory::Cache),
        "storage" => Some(DetectionCategory::Storage),
        _ => None,
    }
}

fn parse_severity(value: &str) -> Option<DetectionSeverity> {
    match value {
        "info" => Some(DetectionSeverity::Info),
        "warning" => Some(DetectionSeverity::Warning),
        "critical" => Some(DetectionSeverity::Critical),
        _ => None,
    }
}

fn json_object_to_map(value: serde_json::Value) -> HashMap<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}
