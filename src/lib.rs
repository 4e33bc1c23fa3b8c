//! # anaplan-tasks
//!
//! Async client for planning-model task APIs: run imports, exports, actions
//! and processes, move files in chunks, and keep an auth token alive.
//!
//! ## Design
//!
//! - **One credential, many models** - a [`Client`] authenticates once and
//!   refreshes the token in the background; every [`Model`] shares it
//! - **Normalized results** - every job kind reduces to a list of
//!   [`OutcomeRecord`]s
//! - **Pluggable transport** - all HTTP goes through the [`Transport`] trait,
//!   so tests and embedders can substitute their own
//!
//! ## Quick Start
//!
//! ```no_run
//! use anaplan_tasks::{AuthMethod, Client, Config, JobDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let method = AuthMethod::Basic {
//!         username: "user@example.com".to_string(),
//!         password: "secret".to_string(),
//!     };
//!     let client = Client::connect(Config::default(), method).await?;
//!     let model = client.model("8a81b09d5e8c6f27015ece3402487d33", "FC123456789ABCDEF");
//!
//!     let export = JobDescriptor::new("116000000001", 3)?;
//!     let report = model.run(&export).await?;
//!     for (record, data) in report.files() {
//!         println!("{}: {} bytes", record.file_id.as_deref().unwrap_or("?"), data.len());
//!     }
//!     for failure in &report.failures {
//!         eprintln!("record {} incomplete: {}", failure.index, failure.error);
//!     }
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Authentication and token lifecycle
pub mod auth;
/// Client facade
pub mod client;
/// Configuration types
pub mod config;
/// Per-model connection context
pub mod connection;
/// Error types
pub mod error;
/// Job descriptors and the submit/poll engine
pub mod jobs;
/// Task result normalization
pub mod normalize;
/// Resource listings
pub mod resources;
/// Submission retry with exponential backoff
pub mod retry;
/// End-to-end job runs
pub mod runner;
/// Chunked file upload and download
pub mod transfer;
/// HTTP transport seam
pub mod transport;
/// Shared record types
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use auth::{AuthMethod, AuthService, AuthorizationManager, Credential, CredentialHandle};
pub use client::{Client, Model};
pub use config::{Config, NestedFailurePolicy};
pub use connection::Connection;
pub use error::{Error, Result};
pub use jobs::{CompletedTask, JobDescriptor, JobEngine, JobKind, MappingParameter, TaskHandle};
pub use normalize::{ArtifactSource, Normalized, Normalizer, StepFailure};
pub use resources::{HttpResourceLookup, ResourceLookup, ResourceType};
pub use runner::{TaskReport, TaskRunner};
pub use transfer::ChunkedTransfer;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
pub use types::{OutcomeRecord, ResourceInfo};
