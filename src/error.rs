//! Error types for anaplan-tasks
//!
//! This module provides the error taxonomy shared by every component:
//! - Transport faults raised by the request seam (never swallowed)
//! - Malformed responses (an expected field is absent, never retried)
//! - Authentication and key-material failures
//! - Caller errors detected before any network call (job kind, parameters)
//! - Submission retry exhaustion and aborted chunk transfers

use std::time::Duration;
use thiserror::Error;

/// Result type alias for anaplan-tasks operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for anaplan-tasks
///
/// Each variant carries enough context (endpoint, job id, chunk index) to
/// diagnose the failing call without re-running it.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "transfer.chunk_size_mb")
        key: Option<String>,
    },

    /// Network, TLS or timeout failure raised by the transport
    #[error("transport fault calling {url}: {message}")]
    Transport {
        /// URL of the failed request
        url: String,
        /// Description of the underlying fault
        message: String,
    },

    /// An expected field was absent or had the wrong type
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint (or logical source) of the offending payload
        endpoint: String,
        /// What was missing or wrong
        reason: String,
    },

    /// The service rejected the credential or verification did not succeed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Private key or certificate could not be decoded
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// An encrypted private key was supplied without a password
    #[error("private key is encrypted but no password was supplied")]
    EncryptedKeyWithoutPassword,

    /// Required authentication parameters are missing
    #[error("authentication method '{method}' is missing required parameters: {}", missing.join(", "))]
    InvalidAuthParameters {
        /// Authentication method name
        method: String,
        /// Names of the missing parameters
        missing: Vec<String>,
    },

    /// Job id prefix does not map to a known job kind
    #[error("job id '{job_id}' does not match any known job kind")]
    UnknownJobKind {
        /// The offending job id
        job_id: String,
    },

    /// Job parameters are not valid for the job kind
    #[error("invalid job parameters: {0}")]
    InvalidJobParameters(String),

    /// A submission attempt was answered with a non-success status
    #[error("submission to {url} rejected with HTTP {status}")]
    SubmitRejected {
        /// Submission URL
        url: String,
        /// HTTP status code returned by the service
        status: u16,
    },

    /// Submission retry budget exhausted
    #[error("request failed after {attempts} attempts: {last_error}")]
    RequestExhausted {
        /// Total number of attempts made (initial + retries)
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },

    /// Unexpected non-success status outside the submission retry path
    #[error("HTTP {status} from {url}")]
    Http {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Task did not reach a terminal state within the configured poll timeout
    #[error("task {task_id} did not complete within {elapsed:?}")]
    PollTimeout {
        /// Task instance id
        task_id: String,
        /// Time spent polling
        elapsed: Duration,
    },

    /// A chunked transfer stopped before all chunks were moved
    #[error("transfer of {resource_id} aborted at chunk {chunk}: {reason}")]
    TransferAborted {
        /// Resource (file) id
        resource_id: String,
        /// Zero-based chunk index where the transfer stopped
        chunk: u32,
        /// The reason the transfer stopped
        reason: String,
    },

    /// Chunk size outside the accepted range
    #[error("chunk size {chunk_size_mb} MB is outside the accepted range 1-50 MB")]
    InvalidChunkSize {
        /// Requested chunk size in megabytes
        chunk_size_mb: u32,
    },

    /// Resource lookup did not contain the requested id or name
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::MalformedResponse`]
    pub(crate) fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Config`]
    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Transport { .. } => "transport_fault",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::AuthenticationFailed(_) => "authentication_failed",
            Error::InvalidKey(_) => "invalid_key",
            Error::EncryptedKeyWithoutPassword => "encrypted_key_without_password",
            Error::InvalidAuthParameters { .. } => "invalid_auth_parameters",
            Error::UnknownJobKind { .. } => "unknown_job_kind",
            Error::InvalidJobParameters(_) => "invalid_job_parameters",
            Error::SubmitRejected { .. } => "submit_rejected",
            Error::RequestExhausted { .. } => "request_exhausted",
            Error::Http { .. } => "http_error",
            Error::PollTimeout { .. } => "poll_timeout",
            Error::TransferAborted { .. } => "transfer_aborted",
            Error::InvalidChunkSize { .. } => "invalid_chunk_size",
            Error::ResourceNotFound(_) => "resource_not_found",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error was detected before any request was sent
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownJobKind { .. }
                | Error::InvalidJobParameters(_)
                | Error::InvalidAuthParameters { .. }
                | Error::InvalidChunkSize { .. }
                | Error::EncryptedKeyWithoutPassword
                | Error::Config { .. }
        )
    }
}
