//! Response normalization
//!
//! A completed task payload is parsed once into a [`TaskResult`] and then
//! reduced by the reducer for its kind into an ordered list of
//! [`OutcomeRecord`]s. Process steps may fetch error dumps and exported files
//! through an [`ArtifactSource`] while being reduced.

mod reducers;
mod shape;

pub use shape::{NestedStep, TaskResult, parse};

use crate::config::NestedFailurePolicy;
use crate::error::{Error, Result};
use crate::jobs::{CompletedTask, JobKind};
use crate::types::OutcomeRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Where normalization fetches error dumps and files from
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// GET an error dump (CSV text) from `url`
    async fn fetch_dump(&self, url: &str) -> Result<String>;

    /// Download a model file by id
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// A record whose error dump or file could not be fetched
#[derive(Debug)]
pub struct StepFailure {
    /// Position of the record (for processes, of the step in `nestedResults`)
    pub index: usize,
    /// Id of the object the record is about, when the service reported one
    pub object_id: Option<String>,
    /// Why the fetch failed
    pub error: Error,
}

/// Records produced for one task, plus any nested step failures
#[derive(Debug, Default)]
pub struct Normalized {
    /// Outcome records in input order
    pub records: Vec<OutcomeRecord>,
    /// Nested steps whose artifacts failed to load
    pub failures: Vec<StepFailure>,
}

impl Normalized {
    fn records(records: Vec<OutcomeRecord>) -> Self {
        Self {
            records,
            failures: Vec::new(),
        }
    }

    /// Whether every step was reduced without a fetch failure
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatches a terminal task result to its reducer
pub struct Normalizer<'a> {
    artifacts: &'a dyn ArtifactSource,
    policy: NestedFailurePolicy,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer
    pub fn new(artifacts: &'a dyn ArtifactSource, policy: NestedFailurePolicy) -> Self {
        Self { artifacts, policy }
    }

    /// Normalize the `task` payload of a job of `kind` polled at `poll_url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] when the payload misses a required
    /// field. No records are produced in that case.
    pub async fn normalize(&self, kind: JobKind, task: &Value, poll_url: &str) -> Result<Normalized> {
        let shape = parse(kind, task, poll_url)?;

        let normalized = match shape {
            TaskResult::Failed { messages } => {
                Normalized::records(reducers::failed(messages, poll_url))
            }
            TaskResult::Import {
                messages,
                dump_available,
                successful,
            } => Normalized::records(vec![reducers::import(
                messages,
                dump_available,
                successful,
                poll_url,
            )]),
            TaskResult::Export {
                object_id,
                dump_available,
                successful,
            } => Normalized::records(vec![reducers::export(
                object_id,
                dump_available,
                successful,
                poll_url,
            )]),
            TaskResult::Action {
                object_id,
                dump_available,
                successful,
            } => Normalized::records(vec![reducers::action(
                object_id,
                dump_available,
                successful,
                poll_url,
            )]),
            TaskResult::Process { steps } => {
                reducers::process(steps, poll_url, self.artifacts, self.policy).await
            }
        };

        Ok(normalized)
    }

    /// Normalize a task returned by the job engine
    pub async fn normalize_task(&self, task: &CompletedTask) -> Result<Normalized> {
        self.normalize(task.kind, &task.result, &task.poll_url).await
    }
}
