//! Core types shared across components

use serde::{Deserialize, Serialize};

/// One normalized result line of a completed job
///
/// Imports, exports and actions produce one record (or one per failure
/// message when the task failed). Processes produce one record per nested
/// step, in the order the service reported them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Human-readable outcome, possibly multi-line
    pub detail: String,

    /// Task status URL the record came from
    pub endpoint: String,

    /// File id to download when `is_file` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    /// Whether the service holds an error dump for this record
    pub dump_available: bool,

    /// Whether the record describes a produced file
    pub is_file: bool,

    /// Id of the model object (action, export, nested step) the record is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Success flag as reported by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,

    /// Where the error dump lives when `dump_available` is set
    ///
    /// `{poll_url}/dump` for imports, exports and actions;
    /// `{poll_url}/dumps/{object_id}` for process steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_url: Option<String>,

    /// Error dump text, fetched during normalization of process steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_dump: Option<String>,

    /// Exported file content, fetched during normalization of process steps
    #[serde(skip)]
    pub file_data: Option<Vec<u8>>,
}

impl OutcomeRecord {
    /// Record with only detail text and source endpoint set
    pub fn new(detail: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Metadata for one model resource as listed by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Resource id
    pub id: String,
    /// Display name
    pub name: String,
    /// Number of stored chunks (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<i64>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_without_empty_optionals() {
        let record = OutcomeRecord::new("done", "https://x/tasks/T1");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "detail": "done",
                "endpoint": "https://x/tasks/T1",
                "dump_available": false,
                "is_file": false
            })
        );
    }

    #[test]
    fn test_resource_info_reads_camel_case() {
        let info: ResourceInfo =
            serde_json::from_value(json!({"id": "113000000001", "name": "data.csv", "chunkCount": 3}))
                .unwrap();
        assert_eq!(info.chunk_count, Some(3));
    }
}
