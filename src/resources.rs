//! Model resource listings
//!
//! [`ResourceLookup`] is the seam the transfer layer uses to learn how many
//! chunks a file has; [`HttpResourceLookup`] implements it against
//! `GET {model_url}/{resource}`.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::ResourceInfo;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Listable model resource collections
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Import definitions
    Imports,
    /// Export definitions
    Exports,
    /// Actions
    Actions,
    /// Processes
    Processes,
    /// Files (import sources and export outputs)
    Files,
    /// Lists
    Lists,
}

impl ResourceType {
    /// Path segment and response key
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Imports => "imports",
            ResourceType::Exports => "exports",
            ResourceType::Actions => "actions",
            ResourceType::Processes => "processes",
            ResourceType::Files => "files",
            ResourceType::Lists => "lists",
        }
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "imports" => Ok(ResourceType::Imports),
            "exports" => Ok(ResourceType::Exports),
            "actions" => Ok(ResourceType::Actions),
            "processes" => Ok(ResourceType::Processes),
            "files" => Ok(ResourceType::Files),
            "lists" => Ok(ResourceType::Lists),
            other => Err(Error::ResourceNotFound(format!(
                "invalid resource '{other}', must be one of imports, exports, actions, processes, files, lists"
            ))),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource metadata the transfer layer depends on
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// File id to stored chunk count
    async fn chunk_counts(&self) -> Result<HashMap<String, i64>>;

    /// Resource name to id
    async fn resource_ids(&self, resource: ResourceType) -> Result<HashMap<String, String>>;
}

/// [`ResourceLookup`] backed by the listing endpoints
#[derive(Clone, Debug)]
pub struct HttpResourceLookup {
    connection: Connection,
}

impl HttpResourceLookup {
    /// Create a lookup for the connection's model
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// List every resource of one type
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] when the call or the embedded `status.code` is not 200
    /// - [`Error::MalformedResponse`] when the body lacks `status.code` or an
    ///   entry has no id or name
    pub async fn list(&self, resource: ResourceType) -> Result<Vec<ResourceInfo>> {
        let url = self.connection.model_path(&[resource.as_str()]);
        tracing::debug!(%resource, "fetching resource list");

        let body = self.connection.get_json(&url).await?;

        let code = body
            .pointer("/status/code")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::malformed(&url, "status or code not found in response"))?;
        if code != 200 {
            return Err(Error::Http {
                url,
                status: u16::try_from(code).unwrap_or(u16::MAX),
            });
        }

        // An empty collection is omitted by the service
        let Some(items) = body.get(resource.as_str()) else {
            return Ok(Vec::new());
        };
        let items: Vec<ResourceInfo> = serde_json::from_value(items.clone())
            .map_err(|e| Error::malformed(&url, format!("unexpected {resource} entry: {e}")))?;

        tracing::debug!(%resource, count = items.len(), "resource list fetched");
        Ok(items)
    }
}

#[async_trait]
impl ResourceLookup for HttpResourceLookup {
    async fn chunk_counts(&self) -> Result<HashMap<String, i64>> {
        let files = self.list(ResourceType::Files).await?;
        Ok(files
            .into_iter()
            .map(|f| (f.id, f.chunk_count.unwrap_or(0)))
            .collect())
    }

    async fn resource_ids(&self, resource: ResourceType) -> Result<HashMap<String, String>> {
        let items = self.list(resource).await?;
        Ok(items.into_iter().map(|r| (r.name, r.id)).collect())
    }
}
