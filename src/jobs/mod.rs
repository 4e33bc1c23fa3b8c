//! Job descriptors and the submit/retry/poll engine
//!
//! A job id starts with a three-character prefix that determines its kind:
//!
//! | prefix | kind    | endpoint    |
//! |--------|---------|-------------|
//! | `112`  | Import  | `imports`   |
//! | `116`  | Export  | `exports`   |
//! | `117`  | Action  | `actions`   |
//! | `118`  | Process | `processes` |

mod engine;

pub use engine::JobEngine;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Closed set of job kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Load data into the model
    Import,
    /// Produce a file from the model
    Export,
    /// Run a model action (delete, sort, ...)
    Action,
    /// Run an ordered sequence of the above
    Process,
}

impl JobKind {
    /// Every kind, in prefix order
    pub const ALL: [JobKind; 4] = [
        JobKind::Import,
        JobKind::Export,
        JobKind::Action,
        JobKind::Process,
    ];

    /// Derive the kind from a job id's prefix
    pub fn from_job_id(job_id: &str) -> Result<Self> {
        let prefix = job_id.get(..3).unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
            .ok_or_else(|| Error::UnknownJobKind {
                job_id: job_id.to_string(),
            })
    }

    /// Three-character id prefix
    pub fn prefix(self) -> &'static str {
        match self {
            JobKind::Import => "112",
            JobKind::Export => "116",
            JobKind::Action => "117",
            JobKind::Process => "118",
        }
    }

    /// Model-relative collection the job lives under
    pub fn endpoint(self) -> &'static str {
        match self {
            JobKind::Import => "imports",
            JobKind::Export => "exports",
            JobKind::Action => "actions",
            JobKind::Process => "processes",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobKind::Import => "import",
            JobKind::Export => "export",
            JobKind::Action => "action",
            JobKind::Process => "process",
        };
        f.write_str(name)
    }
}

/// Runtime mapping parameter for an import
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingParameter {
    /// Dimension or list the mapping applies to
    pub entity_type: String,
    /// Item selected for that dimension
    pub entity_name: String,
}

impl MappingParameter {
    /// Create a mapping parameter
    pub fn new(entity_type: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_name: entity_name.into(),
        }
    }
}

/// What to run and how hard to try submitting it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobDescriptor {
    job_id: String,
    kind: JobKind,
    retry_count: u32,
    mapping_parameters: Vec<MappingParameter>,
}

impl JobDescriptor {
    /// Validate the id prefix and create a descriptor
    ///
    /// `retry_count` is the number of resubmissions after the first rejected
    /// attempt.
    pub fn new(job_id: impl Into<String>, retry_count: u32) -> Result<Self> {
        let job_id = job_id.into();
        let kind = JobKind::from_job_id(&job_id)?;
        Ok(Self {
            job_id,
            kind,
            retry_count,
            mapping_parameters: Vec::new(),
        })
    }

    /// Attach import mapping parameters
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJobParameters`] unless the job is an import.
    pub fn with_mapping_parameters(mut self, parameters: Vec<MappingParameter>) -> Result<Self> {
        if !parameters.is_empty() && self.kind != JobKind::Import {
            return Err(Error::InvalidJobParameters(format!(
                "only imports accept mapping parameters, {} is an {}",
                self.job_id, self.kind
            )));
        }
        self.mapping_parameters = parameters;
        Ok(self)
    }

    /// Job id
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Kind derived from the id
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Resubmissions allowed after the first rejection
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Import mapping parameters (empty for other kinds)
    pub fn mapping_parameters(&self) -> &[MappingParameter] {
        &self.mapping_parameters
    }

    /// Body of the task submission
    pub(crate) fn submission_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "localeName": "en_US" });
        if !self.mapping_parameters.is_empty() {
            body["mappingParameters"] = serde_json::json!(self.mapping_parameters);
        }
        body
    }
}

/// A submitted task awaiting completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskHandle {
    /// Task instance id returned by the submission
    pub task_id: String,
    /// URL polled for task status
    pub poll_url: String,
}

/// A task that reached `COMPLETE`
#[derive(Clone, Debug)]
pub struct CompletedTask {
    /// Kind of the job that ran
    pub kind: JobKind,
    /// Task instance id
    pub task_id: String,
    /// Status URL, also the base for dump retrieval
    pub poll_url: String,
    /// The `task` object of the final status payload
    pub result: serde_json::Value,
}
