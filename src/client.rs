//! Top-level client: one authorization shared by every model it talks to

use crate::auth::{AuthMethod, AuthService, AuthorizationManager, CredentialHandle};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;
use crate::jobs::{JobDescriptor, JobEngine};
use crate::normalize::Normalized;
use crate::resources::{HttpResourceLookup, ResourceType};
use crate::runner::{TaskReport, TaskRunner};
use crate::transfer::ChunkedTransfer;
use crate::transport::{HttpTransport, Transport};
use crate::types::{OutcomeRecord, ResourceInfo};
use std::path::Path;
use std::sync::Arc;

/// Authenticated entry point
///
/// Holds the live credential and its refresh task. Dropping the client stops
/// the refresh; call [`shutdown`](Self::shutdown) to also wait for it to exit.
pub struct Client {
    config: Config,
    transport: Arc<dyn Transport>,
    auth: AuthorizationManager,
}

impl Client {
    /// Validate `config`, authenticate with `method` and start refreshing
    pub async fn connect(config: Config, method: AuthMethod) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.api.request_timeout)?);
        Self::with_transport(config, transport, method).await
    }

    /// Same as [`connect`](Self::connect) over a caller-supplied transport
    pub async fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        method: AuthMethod,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(method = method.name(), auth_url = %config.api.auth_url, "connecting");

        let service = AuthService::new(transport.clone(), config.api.auth_url.clone());
        let auth = AuthorizationManager::acquire(service, &config.auth, &method).await?;

        Ok(Self {
            config,
            transport,
            auth,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the live credential
    pub fn credential(&self) -> CredentialHandle {
        self.auth.credential()
    }

    /// Connection context for one model
    pub fn connection(&self, workspace_id: &str, model_id: &str) -> Connection {
        Connection::new(
            self.transport.clone(),
            self.auth.credential(),
            self.config.api.base_url.clone(),
            workspace_id,
            model_id,
        )
    }

    /// Operations scoped to one model
    pub fn model(&self, workspace_id: &str, model_id: &str) -> Model {
        let connection = self.connection(workspace_id, model_id);
        let lookup = HttpResourceLookup::new(connection.clone());
        let transfer = ChunkedTransfer::new(connection.clone(), Arc::new(lookup.clone()));
        let engine = JobEngine::new(
            connection,
            self.config.retry.clone(),
            self.config.poll.clone(),
        );
        let runner = TaskRunner::new(
            engine,
            transfer.clone(),
            self.config.normalize.nested_failure_policy,
        );

        Model {
            runner,
            transfer,
            lookup,
            chunk_size_mb: self.config.transfer.chunk_size_mb,
        }
    }

    /// Stop the credential refresh without waiting
    pub fn cancel(&self) {
        self.auth.cancel();
    }

    /// Stop the credential refresh and wait for it to exit
    pub async fn shutdown(&self) {
        self.auth.shutdown().await;
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("cancelled", &self.auth.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Jobs, files and listings of one model
#[derive(Clone)]
pub struct Model {
    runner: TaskRunner,
    transfer: ChunkedTransfer,
    lookup: HttpResourceLookup,
    chunk_size_mb: u32,
}

impl Model {
    /// Run a job and return its normalized records
    pub async fn execute_action(&self, descriptor: &JobDescriptor) -> Result<Normalized> {
        self.runner.execute(descriptor).await
    }

    /// Run a job and collect its dumps and files
    pub async fn run(&self, descriptor: &JobDescriptor) -> Result<TaskReport> {
        self.runner.run(descriptor).await
    }

    /// Error dump behind a record, if any
    pub async fn error_dump(&self, record: &OutcomeRecord) -> Result<Option<String>> {
        self.runner.fetch_error_dump(record).await
    }

    /// Upload `data` to a file using the configured chunk size
    pub async fn file_upload(&self, file_id: &str, data: &[u8]) -> Result<u32> {
        self.transfer.upload(file_id, self.chunk_size_mb, data).await
    }

    /// Upload a local file using the configured chunk size
    pub async fn file_upload_path(&self, file_id: &str, path: impl AsRef<Path>) -> Result<u32> {
        self.transfer
            .upload_file(file_id, self.chunk_size_mb, path)
            .await
    }

    /// Download a file
    pub async fn get_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.transfer.download(file_id).await
    }

    /// List resources of one type
    pub async fn list(&self, resource: ResourceType) -> Result<Vec<ResourceInfo>> {
        self.lookup.list(resource).await
    }

    /// Underlying runner
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Underlying transfer client
    pub fn transfer(&self) -> &ChunkedTransfer {
        &self.transfer
    }
}
