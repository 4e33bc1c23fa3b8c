//! Submit a job, retrying rejected submissions, then poll it to completion

use super::{CompletedTask, JobDescriptor, JobKind, TaskHandle};
use crate::config::{PollConfig, SubmitRetryConfig};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::retry::submit_with_retry;
use crate::transport::HttpRequest;
use serde_json::Value;
use tokio::time::Instant;

/// Terminal task state
const COMPLETE: &str = "COMPLETE";

/// Drives one job from submission to `COMPLETE`
#[derive(Clone, Debug)]
pub struct JobEngine {
    connection: Connection,
    retry: SubmitRetryConfig,
    poll: PollConfig,
}

impl JobEngine {
    /// Create an engine bound to one model
    pub fn new(connection: Connection, retry: SubmitRetryConfig, poll: PollConfig) -> Self {
        Self {
            connection,
            retry,
            poll,
        }
    }

    /// Connection the engine submits through
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// `{model_url}/{kind}/{jobId}/tasks`
    pub fn submit_url(&self, descriptor: &JobDescriptor) -> String {
        self.connection
            .model_path(&[descriptor.kind().endpoint(), descriptor.job_id(), "tasks"])
    }

    /// Submit and poll until the task completes
    pub async fn execute(&self, descriptor: &JobDescriptor) -> Result<CompletedTask> {
        let handle = self.submit(descriptor).await?;
        self.poll(descriptor.kind(), &handle).await
    }

    /// Submit a task, retrying non-2xx answers within the descriptor's budget
    pub async fn submit(&self, descriptor: &JobDescriptor) -> Result<TaskHandle> {
        let url = self.submit_url(descriptor);
        let body = descriptor.submission_body();

        tracing::info!(
            job_id = descriptor.job_id(),
            kind = %descriptor.kind(),
            retry_count = descriptor.retry_count(),
            "submitting task"
        );

        let task_id = submit_with_retry(&self.retry, descriptor.retry_count(), || {
            self.submit_once(&url, &body)
        })
        .await?;

        let poll_url = format!("{url}/{}", crate::utils::encode_segment(&task_id));
        tracing::info!(job_id = descriptor.job_id(), task_id = %task_id, "task submitted");

        Ok(TaskHandle { task_id, poll_url })
    }

    async fn submit_once(&self, url: &str, body: &Value) -> Result<String> {
        let response = self.connection.send(HttpRequest::post(url).json(body)?).await?;
        if !response.is_success() {
            return Err(Error::SubmitRejected {
                url: url.to_string(),
                status: response.status,
            });
        }

        let payload = response.json(url)?;
        payload
            .pointer("/task/taskId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::malformed(url, "submission response has no task.taskId"))
    }

    /// Poll a submitted task until `task.taskState == "COMPLETE"`
    ///
    /// Any other state, or a payload without a state, keeps polling. A non-2xx
    /// status ends polling with [`Error::Http`].
    pub async fn poll(&self, kind: JobKind, handle: &TaskHandle) -> Result<CompletedTask> {
        let started = Instant::now();
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            let payload = self.connection.get_json(&handle.poll_url).await?;
            let task = payload.get("task");

            let state = task.and_then(|t| t.get("taskState")).and_then(Value::as_str);
            if state == Some(COMPLETE) {
                tracing::info!(task_id = %handle.task_id, polls, "task complete");
                return Ok(CompletedTask {
                    kind,
                    task_id: handle.task_id.clone(),
                    poll_url: handle.poll_url.clone(),
                    result: task.cloned().unwrap_or(Value::Null),
                });
            }

            tracing::debug!(
                task_id = %handle.task_id,
                state = state.unwrap_or("unknown"),
                step = task
                    .and_then(|t| t.get("currentStep"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(""),
                progress = task.and_then(|t| t.get("progress")).and_then(serde_json::Value::as_f64),
                "task still running"
            );

            if let Some(timeout) = self.poll.timeout
                && started.elapsed() >= timeout
            {
                tracing::error!(task_id = %handle.task_id, polls, "gave up polling task");
                return Err(Error::PollTimeout {
                    task_id: handle.task_id.clone(),
                    elapsed: started.elapsed(),
                });
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }
}
