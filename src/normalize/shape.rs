//! One validating parse step from a raw task payload to a typed result shape

use crate::error::{Error, Result};
use crate::jobs::JobKind;
use crate::utils::lenient_bool;
use serde::Deserialize;
use serde_json::Value;

/// `currentStep` value of a failed task
const FAILED_STEP: &str = "Failed.";

/// Detail type marking a nested export that produced a file
const EXPORT_SUCCEEDED: &str = "exportSucceeded";

/// Detail types starting with this (and longer than it) carry hierarchy row values
const HIERARCHY_ROWS_PREFIX: &str = "hierarchyRows";

/// Typed view of a completed task's result
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskResult {
    /// The task reported `currentStep == "Failed."`
    Failed {
        /// One message per failure detail
        messages: Vec<String>,
    },
    /// Import outcome
    Import {
        /// Message lines, including nested values
        messages: Vec<String>,
        /// Error dump available
        dump_available: bool,
        /// Reported success
        successful: Option<bool>,
    },
    /// Export outcome
    Export {
        /// Produced file id
        object_id: String,
        /// Error dump available
        dump_available: bool,
        /// Reported success
        successful: Option<bool>,
    },
    /// Action outcome
    Action {
        /// Action id
        object_id: String,
        /// Error dump available
        dump_available: bool,
        /// Reported success
        successful: Option<bool>,
    },
    /// Process outcome, one entry per nested step
    Process {
        /// Nested steps in reported order
        steps: Vec<NestedStep>,
    },
}

/// One step of a process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NestedStep {
    /// Id of the import/export/action that ran; absent ids leave the step's
    /// artifacts unreachable
    pub object_id: Option<String>,
    /// Reported success
    pub successful: Option<bool>,
    /// Error dump available at `{poll_url}/dumps/{object_id}`
    pub dump_available: bool,
    /// Message lines
    pub messages: Vec<String>,
    /// The step exported a file named by `object_id`
    pub export_succeeded: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    current_step: Option<String>,
    result: Option<RawResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    object_id: Option<Value>,
    successful: Option<Value>,
    failure_dump_available: Option<Value>,
    details: Option<Vec<RawDetail>>,
    nested_results: Option<Vec<RawNested>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetail {
    local_message_text: Option<Value>,
    #[serde(rename = "type")]
    detail_type: Option<String>,
    values: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNested {
    object_id: Option<Value>,
    successful: Option<Value>,
    failure_dump_available: Option<Value>,
    details: Option<Vec<RawDetail>>,
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flag(value: Option<&Value>, field: &str, endpoint: &str) -> Result<Option<bool>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => lenient_bool(v)
            .map(Some)
            .ok_or_else(|| Error::malformed(endpoint, format!("{field} is not a boolean: {v}"))),
    }
}

fn object_id(value: Option<&Value>, context: &str, endpoint: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::malformed(endpoint, format!("{context} has no objectId"))),
    }
}

/// Message lines of a detail list: every `localMessageText` followed by its `values`
fn messages(details: &[RawDetail], include_hierarchy_rows: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for detail in details {
        let mut values_taken = false;
        if let Some(message) = &detail.local_message_text {
            lines.push(text(message));
            if let Some(values) = &detail.values {
                lines.extend(values.iter().map(text));
                values_taken = true;
            }
        }
        if include_hierarchy_rows && !values_taken && is_hierarchy_rows(detail)
            && let Some(values) = &detail.values
        {
            lines.extend(values.iter().map(text));
        }
    }
    lines
}

fn is_hierarchy_rows(detail: &RawDetail) -> bool {
    detail
        .detail_type
        .as_deref()
        .and_then(|t| t.strip_prefix(HIERARCHY_ROWS_PREFIX))
        .is_some_and(|rest| !rest.is_empty())
}

/// Validate `task` for `kind` and produce its typed shape
///
/// All structural checks happen here, so reducers never see a partial shape.
pub fn parse(kind: JobKind, task: &Value, endpoint: &str) -> Result<TaskResult> {
    let raw: RawTask = serde_json::from_value(task.clone())
        .map_err(|e| Error::malformed(endpoint, format!("unexpected task payload: {e}")))?;
    let result = raw
        .result
        .ok_or_else(|| Error::malformed(endpoint, "task has no result"))?;

    if raw.current_step.as_deref() == Some(FAILED_STEP) {
        let details = result
            .details
            .ok_or_else(|| Error::malformed(endpoint, "failed task has no result.details"))?;
        let messages = details
            .iter()
            .filter_map(|d| d.local_message_text.as_ref().map(text))
            .collect();
        return Ok(TaskResult::Failed { messages });
    }

    let dump_available = flag(
        result.failure_dump_available.as_ref(),
        "failureDumpAvailable",
        endpoint,
    )?
    .unwrap_or(false);
    let successful = flag(result.successful.as_ref(), "successful", endpoint)?;

    match kind {
        JobKind::Import => {
            let details = result
                .details
                .ok_or_else(|| Error::malformed(endpoint, "import result has no details"))?;
            Ok(TaskResult::Import {
                messages: messages(&details, false),
                dump_available,
                successful,
            })
        }
        JobKind::Export => Ok(TaskResult::Export {
            object_id: object_id(result.object_id.as_ref(), "export result", endpoint)?,
            dump_available,
            successful,
        }),
        JobKind::Action => Ok(TaskResult::Action {
            object_id: object_id(result.object_id.as_ref(), "action result", endpoint)?,
            dump_available,
            successful,
        }),
        JobKind::Process => {
            let nested = result
                .nested_results
                .ok_or_else(|| Error::malformed(endpoint, "process result has no nestedResults"))?;
            let steps = nested
                .into_iter()
                .enumerate()
                .map(|(i, step)| parse_step(i, step, endpoint))
                .collect();
            Ok(TaskResult::Process { steps })
        }
    }
}

/// Nested steps never fail the parse: a step missing its details reports no
/// messages, and unreadable fields degrade to "unknown" so the remaining steps
/// still produce records.
fn parse_step(index: usize, step: RawNested, endpoint: &str) -> NestedStep {
    let object_id = match &step.object_id {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => {
            tracing::warn!(index, endpoint, "nested result has no objectId");
            None
        }
    };
    let details = step.details.unwrap_or_default();

    let lenient = |value: Option<&Value>, field: &str| match flag(value, field, endpoint) {
        Ok(flag) => flag,
        Err(e) => {
            tracing::warn!(index, endpoint, error = %e, "ignoring unreadable nested flag");
            None
        }
    };

    NestedStep {
        successful: lenient(step.successful.as_ref(), "successful"),
        dump_available: lenient(step.failure_dump_available.as_ref(), "failureDumpAvailable")
            .unwrap_or(false),
        messages: messages(&details, true),
        export_succeeded: details
            .iter()
            .any(|d| d.detail_type.as_deref() == Some(EXPORT_SUCCEEDED)),
        object_id,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EP: &str = "https://x/tasks/T1";

    #[test]
    fn test_failed_task_takes_failure_path_for_any_kind() {
        let task = json!({
            "currentStep": "Failed.",
            "result": {"details": [
                {"localMessageText": "row 3 invalid"},
                {"type": "noMessage"},
                {"localMessageText": "aborted"}
            ]}
        });
        for kind in JobKind::ALL {
            assert_eq!(
                parse(kind, &task, EP).unwrap(),
                TaskResult::Failed {
                    messages: vec!["row 3 invalid".into(), "aborted".into()]
                }
            );
        }
    }

    #[test]
    fn test_missing_result_or_details_is_malformed() {
        let cases = [
            (JobKind::Import, json!({"currentStep": "Complete."})),
            (JobKind::Import, json!({"currentStep": "Complete.", "result": {}})),
            (JobKind::Action, json!({"currentStep": "Failed.", "result": {}})),
            (JobKind::Export, json!({"result": {"successful": true}})),
            (JobKind::Action, json!({"result": {"objectId": ""}})),
            (JobKind::Process, json!({"result": {"details": []}})),
        ];
        for (kind, task) in cases {
            assert!(
                matches!(parse(kind, &task, EP), Err(Error::MalformedResponse { .. })),
                "{kind} {task} should be malformed"
            );
        }
    }

    #[test]
    fn test_import_messages_include_values() {
        let task = json!({
            "currentStep": "Complete.",
            "result": {
                "successful": true,
                "failureDumpAvailable": "true",
                "details": [
                    {"localMessageText": "2 rows imported", "values": ["a", "b"]},
                    {"values": ["ignored without message"]},
                    {"localMessageText": "1 warning", "values": [3]}
                ]
            }
        });
        assert_eq!(
            parse(JobKind::Import, &task, EP).unwrap(),
            TaskResult::Import {
                messages: vec![
                    "2 rows imported".into(),
                    "a".into(),
                    "b".into(),
                    "1 warning".into(),
                    "3".into()
                ],
                dump_available: true,
                successful: Some(true),
            }
        );
    }

    #[test]
    fn test_bad_flag_text_is_malformed() {
        let task = json!({"result": {"objectId": "117000000001", "successful": "sometimes"}});
        assert!(matches!(
            parse(JobKind::Action, &task, EP),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_process_steps_keep_order_and_hierarchy_values() {
        let task = json!({
            "currentStep": "Complete.",
            "result": {"nestedResults": [
                {
                    "objectId": "112000000001",
                    "successful": false,
                    "failureDumpAvailable": true,
                    "details": [
                        {"localMessageText": "1 row failed", "values": ["row 7"]},
                        {"type": "hierarchyRowsProcessed", "values": ["Parent: 4"]},
                        {"type": "hierarchyRows", "values": ["not matched"]}
                    ]
                },
                {
                    "objectId": "116000000002",
                    "successful": "true",
                    "failureDumpAvailable": "false",
                    "details": [{"type": "exportSucceeded"}]
                }
            ]}
        });

        let TaskResult::Process { steps } = parse(JobKind::Process, &task, EP).unwrap() else {
            panic!("expected process shape");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].object_id.as_deref(), Some("112000000001"));
        assert_eq!(steps[0].messages, vec!["1 row failed", "row 7", "Parent: 4"]);
        assert!(steps[0].dump_available);
        assert!(!steps[0].export_succeeded);
        assert_eq!(steps[1].object_id.as_deref(), Some("116000000002"));
        assert!(steps[1].export_succeeded);
        assert_eq!(steps[1].successful, Some(true));
    }

    #[test]
    fn test_hierarchy_values_not_duplicated_for_message_details() {
        let task = json!({"result": {"nestedResults": [{
            "objectId": "112000000001",
            "details": [{
                "localMessageText": "hierarchy",
                "type": "hierarchyRowsIgnored",
                "values": ["x"]
            }]
        }]}});
        let TaskResult::Process { steps } = parse(JobKind::Process, &task, EP).unwrap() else {
            panic!("expected process shape");
        };
        assert_eq!(steps[0].messages, vec!["hierarchy", "x"]);
    }

    #[test]
    fn test_nested_action_step_without_details() {
        let task = json!({"currentStep": "Complete.", "result": {"nestedResults": [
            {"objectId": "112000000001", "details": [{"localMessageText": "5 rows"}]},
            {"objectId": "117000000002", "successful": true, "failureDumpAvailable": false}
        ]}});

        let TaskResult::Process { steps } = parse(JobKind::Process, &task, EP).unwrap() else {
            panic!("expected process shape");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].object_id.as_deref(), Some("117000000002"));
        assert!(steps[1].messages.is_empty());
        assert_eq!(steps[1].successful, Some(true));
        assert!(!steps[1].export_succeeded);
    }

    #[test]
    fn test_nested_level_gaps_keep_other_steps() {
        let task = json!({"result": {"nestedResults": [
            {"objectId": "112000000001", "details": [{"localMessageText": "ok"}]},
            {"successful": "sometimes", "details": []}
        ]}});

        let TaskResult::Process { steps } = parse(JobKind::Process, &task, EP).unwrap() else {
            panic!("expected process shape");
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].messages, vec!["ok"]);
        assert_eq!(steps[1].object_id, None);
        assert_eq!(steps[1].successful, None);
    }
}
