//! Run a job end to end: execute, normalize, then collect error dumps and files

use crate::config::NestedFailurePolicy;
use crate::error::Result;
use crate::jobs::{JobDescriptor, JobEngine};
use crate::normalize::{ArtifactSource, Normalized, Normalizer, StepFailure};
use crate::transfer::ChunkedTransfer;
use crate::types::OutcomeRecord;
use async_trait::async_trait;
use std::collections::HashSet;

/// Everything a finished job produced
///
/// Records carry their own artifacts: `error_dump` for records with a dump
/// and `file_data` for file records, unless fetching them failed, in which
/// case `failures` says why.
#[derive(Debug)]
pub struct TaskReport {
    /// Task instance id
    pub task_id: String,
    /// Normalized records in order
    pub records: Vec<OutcomeRecord>,
    /// Records whose error dump or file could not be fetched
    pub failures: Vec<StepFailure>,
}

impl TaskReport {
    /// Whether every artifact was fetched
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fetched error dumps, in record order
    pub fn dumps(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| r.error_dump.as_deref())
    }

    /// File records with their fetched content, in record order
    pub fn files(&self) -> impl Iterator<Item = (&OutcomeRecord, &[u8])> {
        self.records
            .iter()
            .filter(|r| r.is_file)
            .filter_map(|r| r.file_data.as_deref().map(|data| (r, data)))
    }
}

/// Executes jobs against one model and normalizes their results
#[derive(Clone)]
pub struct TaskRunner {
    engine: JobEngine,
    transfer: ChunkedTransfer,
    policy: NestedFailurePolicy,
}

impl TaskRunner {
    /// Create a runner
    pub fn new(engine: JobEngine, transfer: ChunkedTransfer, policy: NestedFailurePolicy) -> Self {
        Self {
            engine,
            transfer,
            policy,
        }
    }

    /// Execute a job and normalize its result
    ///
    /// Error dumps of non-process jobs are left for [`fetch_error_dump`](Self::fetch_error_dump).
    pub async fn execute(&self, descriptor: &JobDescriptor) -> Result<Normalized> {
        let completed = self.engine.execute(descriptor).await?;
        Normalizer::new(self, self.policy)
            .normalize_task(&completed)
            .await
    }

    /// Execute a job and fetch every dump and file its records point at
    ///
    /// A failed fetch is added to the report's failures. Under
    /// [`NestedFailurePolicy::Continue`] the remaining records are still
    /// fetched; under [`NestedFailurePolicy::Abort`] fetching stops there.
    /// Records never get dropped at this stage.
    pub async fn run(&self, descriptor: &JobDescriptor) -> Result<TaskReport> {
        let completed = self.engine.execute(descriptor).await?;
        let Normalized {
            mut records,
            mut failures,
        } = Normalizer::new(self, self.policy)
            .normalize_task(&completed)
            .await?;

        // Steps that already failed during normalization are not fetched again
        let failed: HashSet<usize> = failures.iter().map(|f| f.index).collect();
        let stop_early = !failed.is_empty() && self.policy == NestedFailurePolicy::Abort;

        if !stop_early {
            for (index, record) in records.iter_mut().enumerate() {
                if failed.contains(&index) {
                    continue;
                }
                if let Err(error) = self.fetch_artifacts(record).await {
                    tracing::warn!(
                        task_id = %completed.task_id,
                        index,
                        error = %error,
                        policy = ?self.policy,
                        "failed to fetch record artifacts"
                    );
                    failures.push(StepFailure {
                        index,
                        object_id: record.object_id.clone(),
                        error,
                    });
                    if self.policy == NestedFailurePolicy::Abort {
                        break;
                    }
                }
            }
        }

        let report = TaskReport {
            task_id: completed.task_id,
            records,
            failures,
        };
        tracing::info!(
            task_id = %report.task_id,
            records = report.records.len(),
            dumps = report.dumps().count(),
            files = report.files().count(),
            failures = report.failures.len(),
            "task run finished"
        );
        Ok(report)
    }

    async fn fetch_artifacts(&self, record: &mut OutcomeRecord) -> Result<()> {
        if record.error_dump.is_none()
            && let Some(dump) = self.fetch_error_dump(record).await?
        {
            record.error_dump = Some(dump);
        }
        if record.is_file
            && record.file_data.is_none()
            && let Some(file_id) = &record.file_id
        {
            record.file_data = Some(self.transfer.download(file_id).await?);
        }
        Ok(())
    }

    /// Error dump for a record, if the service has one
    ///
    /// Uses the dump already fetched during normalization when present, else
    /// GETs the record's `dump_url`.
    pub async fn fetch_error_dump(&self, record: &OutcomeRecord) -> Result<Option<String>> {
        if !record.dump_available {
            return Ok(None);
        }
        if let Some(dump) = &record.error_dump {
            return Ok(Some(dump.clone()));
        }
        match &record.dump_url {
            Some(url) => self.fetch_dump(url).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ArtifactSource for TaskRunner {
    async fn fetch_dump(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "fetching error dump");
        let response = self.engine.connection().get(url).await?;
        Ok(response.text())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.transfer.download(file_id).await
    }
}
