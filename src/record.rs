//! Review records and their identifiers

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::review::ReviewStatus;

/// Stable identifier of a queue record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&RecordId> for RecordId {
    fn from(id: &RecordId) -> Self {
        id.clone()
    }
}

/// A unit of work to classify.
///
/// `payload` holds the ingested fields (subject, question, source
/// classification, ...) and is read-only to reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: RecordId,

    #[serde(default)]
    pub payload: Map<String, Value>,

    #[serde(default)]
    pub status: ReviewStatus,

    #[serde(default)]
    pub reviewer_note: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ko_reason: Option<String>,

    #[serde(default = "Utc::now")]
    pub ingested_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// New pending record with the given payload
    pub fn new(id: impl Into<RecordId>, payload: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            payload,
            status: ReviewStatus::Pending,
            reviewer_note: String::new(),
            ko_reason: None,
            ingested_at: Utc::now(),
        }
    }

    /// Payload field rendered as a string, empty when absent
    pub fn field(&self, key: &str) -> String {
        match self.payload.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}
