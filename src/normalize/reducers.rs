//! Per-kind reducers from a [`TaskResult`](super::TaskResult) to outcome records

use super::shape::NestedStep;
use super::{ArtifactSource, Normalized, StepFailure};
use crate::config::NestedFailurePolicy;
use crate::error::{Error, Result};
use crate::types::OutcomeRecord;
use crate::utils::encode_segment;

fn task_dump_url(dump_available: bool, endpoint: &str) -> Option<String> {
    dump_available.then(|| format!("{endpoint}/dump"))
}

pub(super) fn failed(messages: Vec<String>, endpoint: &str) -> Vec<OutcomeRecord> {
    messages
        .into_iter()
        .map(|message| {
            tracing::warn!(message = %message, "task failed to run");
            OutcomeRecord::new(
                format!("The task has failed to run due to an error: {message}"),
                endpoint,
            )
        })
        .collect()
}

pub(super) fn import(
    messages: Vec<String>,
    dump_available: bool,
    successful: Option<bool>,
    endpoint: &str,
) -> OutcomeRecord {
    tracing::info!(dump_available, ?successful, "import finished");
    OutcomeRecord {
        dump_available,
        dump_url: task_dump_url(dump_available, endpoint),
        successful,
        ..OutcomeRecord::new(messages.join("\n"), endpoint)
    }
}

pub(super) fn export(
    object_id: String,
    dump_available: bool,
    successful: Option<bool>,
    endpoint: &str,
) -> OutcomeRecord {
    tracing::info!(file_id = %object_id, dump_available, "export finished");
    OutcomeRecord {
        file_id: Some(object_id.clone()),
        object_id: Some(object_id),
        dump_available,
        dump_url: task_dump_url(dump_available, endpoint),
        is_file: true,
        successful,
        ..OutcomeRecord::new("File export completed.", endpoint)
    }
}

pub(super) fn action(
    object_id: String,
    dump_available: bool,
    successful: Option<bool>,
    endpoint: &str,
) -> OutcomeRecord {
    let reported = successful.map_or_else(|| "unknown".to_string(), |s| s.to_string());
    tracing::info!(object_id = %object_id, dump_available, ?successful, "action finished");
    OutcomeRecord {
        object_id: Some(object_id.clone()),
        dump_available,
        dump_url: task_dump_url(dump_available, endpoint),
        successful,
        ..OutcomeRecord::new(format!("{object_id} completed successfully: {reported}"), endpoint)
    }
}

/// Reduce every nested step, fetching its dump and exported file
///
/// Steps are handled strictly in order. What happens when a fetch fails is
/// decided by `policy`.
pub(super) async fn process(
    steps: Vec<NestedStep>,
    endpoint: &str,
    artifacts: &dyn ArtifactSource,
    policy: NestedFailurePolicy,
) -> Normalized {
    let mut normalized = Normalized::default();

    for (index, step) in steps.into_iter().enumerate() {
        let object_id = step.object_id.as_deref().unwrap_or("unknown");
        let mut record = OutcomeRecord {
            object_id: step.object_id.clone(),
            dump_available: step.dump_available,
            dump_url: step
                .object_id
                .as_ref()
                .filter(|_| step.dump_available)
                .map(|id| format!("{endpoint}/dumps/{}", encode_segment(id))),
            successful: step.successful,
            is_file: step.export_succeeded,
            file_id: step.object_id.clone().filter(|_| step.export_succeeded),
            ..OutcomeRecord::new(step.messages.join("\n"), endpoint)
        };

        match fetch_step_artifacts(index, &step, artifacts, &mut record).await {
            Ok(()) => {
                tracing::debug!(index, object_id, "nested step reduced");
                normalized.records.push(record);
            }
            Err(error) => {
                tracing::warn!(
                    index,
                    object_id,
                    error = %error,
                    ?policy,
                    "failed to fetch nested step artifacts"
                );
                normalized.failures.push(StepFailure {
                    index,
                    object_id: step.object_id.clone(),
                    error,
                });
                match policy {
                    NestedFailurePolicy::Continue => normalized.records.push(record),
                    NestedFailurePolicy::Abort => break,
                }
            }
        }
    }

    normalized
}

async fn fetch_step_artifacts(
    index: usize,
    step: &NestedStep,
    artifacts: &dyn ArtifactSource,
    record: &mut OutcomeRecord,
) -> Result<()> {
    if !step.dump_available && !step.export_succeeded {
        return Ok(());
    }
    let Some(object_id) = step.object_id.as_deref() else {
        return Err(Error::malformed(
            &record.endpoint,
            format!("nested result {index} has artifacts but no objectId"),
        ));
    };

    if let Some(url) = &record.dump_url {
        record.error_dump = Some(artifacts.fetch_dump(url).await?);
    }
    if step.export_succeeded {
        record.file_data = Some(artifacts.download_file(object_id).await?);
    }
    Ok(())
}
