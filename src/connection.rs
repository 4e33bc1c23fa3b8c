//! Connection context: who to call, for which model, with which credential

use crate::auth::CredentialHandle;
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::utils::join_path;
use serde_json::Value;
use std::sync::Arc;

/// Shared credential plus workspace and model ids
///
/// Cheap to clone. Every request made through a connection carries the
/// credential as it is at send time, so a background refresh is picked up
/// without rebuilding the connection.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn Transport>,
    credential: CredentialHandle,
    base_url: String,
    workspace_id: String,
    model_id: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("workspace_id", &self.workspace_id)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection context
    pub fn new(
        transport: Arc<dyn Transport>,
        credential: CredentialHandle,
        base_url: impl Into<String>,
        workspace_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credential,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            workspace_id: workspace_id.into(),
            model_id: model_id.into(),
        }
    }

    /// Workspace id
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Model id
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Shared credential handle
    pub fn credential(&self) -> &CredentialHandle {
        &self.credential
    }

    /// `{base}/workspaces/{ws}/models/{model}`
    pub fn model_url(&self) -> String {
        join_path(
            &self.base_url,
            &["workspaces", &self.workspace_id, "models", &self.model_id],
        )
    }

    /// `{model_url}/{segments...}`
    pub fn model_path(&self, segments: &[&str]) -> String {
        join_path(&self.model_url(), segments)
    }

    /// Send a request with the current token attached
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.credential.snapshot();
        self.transport
            .send(request.header("Authorization", token.token()))
            .await
    }

    /// GET `url` and require a 2xx response
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.send(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(Error::Http {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// GET `url` and parse a 2xx JSON body
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        self.get(url).await?.json(url)
    }
}
