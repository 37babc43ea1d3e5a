//! Detection records raised by detectors.
//!
//! A [`Detection`] is the structured description of one identified
//! performance issue: identity, severity, human-readable explanation,
//! supporting evidence, and an optional action hint for the remediation
//! actor. Detections are immutable once created; lifecycle state
//! (active/resolved/superseded) lives on the knowledge side, never here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UnixSeconds;

/// Issue grouping used for filtering and supersession policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionCategory {
    Query,
    Connection,
    Cache,
    Storage,
}

impl DetectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionCategory::Query => "query",
            DetectionCategory::Connection => "connection",
            DetectionCategory::Cache => "cache",
            DetectionCategory::Storage => "storage",
        }
    }
}

/// Urgency tier. Ordered: `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSeverity {
    Info,
    Warning,
    Critical,
}

impl DetectionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSeverity::Info => "info",
            DetectionSeverity::Warning => "warning",
            DetectionSeverity::Critical => "critical",
        }
    }
}

/// A structured record of one identified performance/health issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Globally unique id: `<detector>-<unix-seconds>-<random-suffix>`.
    pub id: String,
    /// Stable dedup fingerprint of detector + resource. NOT unique across
    /// time: a re-occurring condition produces a new id under the same key.
    pub key: String,
    /// Name of the detector that raised the issue.
    pub detector_name: String,
    pub category: DetectionCategory,
    pub severity: DetectionSeverity,

    pub database_id: String,
    /// When the triggering snapshot was taken (unix seconds).
    pub timestamp: UnixSeconds,

    pub title: String,
    pub description: String,

    /// Open map of supporting measurements. Values are heterogeneous JSON.
    pub evidence: HashMap<String, serde_json::Value>,

    /// Human-readable remediation guidance, specialized per database engine
    /// when the engine is known.
    pub recommendation: String,

    /// Hint for the remediation actor. The analysis core never decides *how*
    /// to remediate; it only forwards this hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub action_metadata: HashMap<String, serde_json::Value>,
}

impl Detection {
    /// Create a detection with a freshly generated unique id and an empty
    /// key. The dedup key is derived after the detector has populated
    /// evidence and metadata — see [`Detection::assign_key`].
    pub fn new(
        detector_name: &str,
        category: DetectionCategory,
        severity: DetectionSeverity,
        database_id: &str,
        timestamp: UnixSeconds,
    ) -> Self {
        Self {
            id: generate_detection_id(detector_name, timestamp),
            key: String::new(),
            detector_name: detector_name.to_string(),
            category,
            severity,
            database_id: database_id.to_string(),
            timestamp,
            title: String::new(),
            description: String::new(),
            evidence: HashMap::new(),
            recommendation: String::new(),
            action_type: None,
            action_metadata: HashMap::new(),
        }
    }

    /// Derive and set the dedup key: `database:detector:resource`.
    ///
    /// The resource identifier is extracted from action metadata (table and
    /// column for index issues), then evidence (`identifier`, `query_hash`),
    /// falling back to the category when the detection is database-wide.
    pub fn assign_key(&mut self) {
        let resource = self.resource_identifier();
        self.key = format!("{}:{}:{}", self.database_id, self.detector_name, resource);
    }

    fn resource_identifier(&self) -> String {
        if let Some(table) = self.metadata_str("table_name") {
            return match self.metadata_str("column_name") {
                Some(column) => format!("{table}.{column}"),
                None => table,
            };
        }
        if let Some(identifier) = self.metadata_str("identifier") {
            return identifier;
        }
        for field in ["identifier", "query_hash"] {
            if let Some(value) = self.evidence.get(field).and_then(|v| v.as_str()) {
                return value.to_string();
            }
        }
        self.category.as_str().to_string()
    }

    fn metadata_str(&self, field: &str) -> Option<String> {
        self.action_metadata
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Lifecycle state of a knowledge-side detection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionState {
    Active,
    Resolved,
    Superseded,
}

impl DetectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionState::Active => "active",
            DetectionState::Resolved => "resolved",
            DetectionState::Superseded => "superseded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(DetectionState::Active),
            "resolved" => Some(DetectionState::Resolved),
            "superseded" => Some(DetectionState::Superseded),
            _ => None,
        }
    }

    /// Terminal records are immutable; re-occurrence creates a new record.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DetectionState::Active)
    }
}

/// A detection plus its knowledge-side lifecycle fields.
///
/// Owned exclusively by the knowledge store; the embedded detection is never
/// mutated after registration (first-seen evidence wins), only the lifecycle
/// fields change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub detection: Detection,
    pub state: DetectionState,
    /// Solution text stamped when the record was resolved.
    pub resolved_by: Option<String>,
    /// Last time the same condition was observed (refreshed on dedup hits).
    pub last_seen: crate::types::Timestamp,
}

/// Generate a collision-safe detection id.
///
/// Detector name and timestamp keep ids human-scannable in logs; the random
/// suffix makes them unique even when the same detector fires twice within
/// one second.
fn generate_detection_id(detector_name: &str, timestamp: UnixSeconds) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{detector_name}-{timestamp}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn base_detection() -> Detection {
        Detection::new(
            "missing_index",
            DetectionCategory::Query,
            DetectionSeverity::Warning,
            "db-1",
            1_700_000_000,
        )
    }

    #[test]
    fn severity_ordering() {
        assert!(DetectionSeverity::Info < DetectionSeverity::Warning);
        assert!(DetectionSeverity::Warning < DetectionSeverity::Critical);
    }

    #[test]
    fn ids_are_unique_within_one_second() {
        let a = generate_detection_id("cache", 1_700_000_000);
        let b = generate_detection_id("cache", 1_700_000_000);
        assert_ne!(a, b);
        assert!(a.starts_with("cache-1700000000-"));
    }

    #[test]
    fn key_uses_table_and_column_when_present() {
        let mut d = base_detection();
        d.action_metadata
            .insert("table_name".into(), json!("users"));
        d.action_metadata
            .insert("column_name".into(), json!("email"));
        d.assign_key();
        assert_eq!(d.key, "db-1:missing_index:users.email");
    }

    #[test]
    fn key_falls_back_to_category() {
        let mut d = base_detection();
        d.assign_key();
        assert_eq!(d.key, "db-1:missing_index:query");
    }

    #[test]
    fn key_uses_evidence_query_hash() {
        let mut d = base_detection();
        d.evidence.insert("query_hash".into(), json!("abc123"));
        d.assign_key();
        assert_eq!(d.key, "db-1:missing_index:abc123");
    }

    #[test]
    fn round_trip_preserves_heterogeneous_evidence() {
        let mut d = base_detection();
        d.title = "Sequential scans detected".into();
        d.description = "Table scans without an index".into();
        d.recommendation = "Create an index".into();
        d.evidence.insert("table_name".into(), json!("users"));
        d.evidence.insert("sequential_scans".into(), json!(120));
        d.evidence.insert("usage_ratio".into(), json!(0.93));
        d.evidence.insert("in_grace".into(), json!(false));
        d.action_type = Some("create_index".into());
        d.action_metadata.insert("priority".into(), json!("high"));
        d.assign_key();

        let json = serde_json::to_string(&d).unwrap();
        let back: Detection = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, d.id);
        assert_eq!(back.key, d.key);
        assert_eq!(back.severity, DetectionSeverity::Warning);
        assert_eq!(back.category, DetectionCategory::Query);
        assert_eq!(back.evidence["table_name"], json!("users"));
        assert_eq!(back.evidence["sequential_scans"], json!(120));
        assert_eq!(back.evidence["usage_ratio"], json!(0.93));
        assert_eq!(back.evidence["in_grace"], json!(false));
        assert_eq!(back.action_type.as_deref(), Some("create_index"));
        assert_eq!(back.action_metadata["priority"], json!("high"));
    }

    #[test]
    fn state_parsing_round_trips() {
        assert_matches!(DetectionState::parse("active"), Some(DetectionState::Active));
        assert_matches!(
            DetectionState::parse("superseded"),
            Some(DetectionState::Superseded)
        );
        assert_matches!(DetectionState::parse("zombie"), None);
        assert!(!DetectionState::Active.is_terminal());
        assert!(DetectionState::Resolved.is_terminal());
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&DetectionSeverity::Critical).unwrap();
        assert_eq!(json, r#""critical""#);
    }
}
