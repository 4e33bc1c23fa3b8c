//! Chunked upload and download of model files
//!
//! Upload handshake for file `{id}` at `{model_url}/files/{id}`:
//!
//! 1. `POST {url}` with `{"id": id, "chunkCount": -1}` to open the upload
//! 2. `PUT {url}/chunks/{i}` for every chunk, `i` ascending from 0
//! 3. `POST {url}/complete`
//!
//! A failed chunk stops the upload before step 3; nothing is rolled back.
//! Downloads resolve the chunk count through a [`ResourceLookup`] and GET
//! `{url}/chunks/{i}` in order.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::resources::ResourceLookup;
use crate::transport::HttpRequest;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes per megabyte of chunk size
pub const MIB: usize = 1 << 20;

/// Largest request body the service accepts, in megabytes
pub const MAX_CHUNK_SIZE_MB: u32 = 50;

/// Progress of one transfer
#[derive(Debug)]
struct TransferState<'a> {
    resource_id: &'a str,
    chunk_count: Option<u32>,
    index: u32,
}

impl TransferState<'_> {
    fn abort(&self, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        tracing::error!(
            resource_id = self.resource_id,
            chunk = self.index,
            chunk_count = ?self.chunk_count,
            reason = %reason,
            "transfer aborted"
        );
        Error::TransferAborted {
            resource_id: self.resource_id.to_string(),
            chunk: self.index,
            reason,
        }
    }
}

/// Uploads and downloads files of one model in bounded chunks
#[derive(Clone)]
pub struct ChunkedTransfer {
    connection: Connection,
    lookup: Arc<dyn ResourceLookup>,
}

impl ChunkedTransfer {
    /// Create a transfer client
    pub fn new(connection: Connection, lookup: Arc<dyn ResourceLookup>) -> Self {
        Self { connection, lookup }
    }

    /// `{model_url}/files/{id}`
    pub fn resource_url(&self, resource_id: &str) -> String {
        self.connection.model_path(&["files", resource_id])
    }

    /// Upload an in-memory buffer
    ///
    /// Returns the number of chunks sent.
    pub async fn upload(&self, resource_id: &str, chunk_size_mb: u32, data: &[u8]) -> Result<u32> {
        self.upload_reader(resource_id, chunk_size_mb, data).await
    }

    /// Upload a local file, reading it one chunk at a time
    pub async fn upload_file(
        &self,
        resource_id: &str,
        chunk_size_mb: u32,
        path: impl AsRef<Path>,
    ) -> Result<u32> {
        validate_chunk_size(chunk_size_mb)?;
        let file = tokio::fs::File::open(path.as_ref()).await?;
        tracing::debug!(resource_id, path = %path.as_ref().display(), "uploading local file");
        self.upload_reader(resource_id, chunk_size_mb, file).await
    }

    /// Upload everything `reader` yields
    pub async fn upload_reader<R>(&self, resource_id: &str, chunk_size_mb: u32, mut reader: R) -> Result<u32>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_chunk_size(chunk_size_mb)?;
        let chunk_bytes = chunk_size_mb as usize * MIB;
        let url = self.resource_url(resource_id);

        self.post_metadata(&url, resource_id, -1).await?;
        tracing::info!(resource_id, chunk_size_mb, "starting upload");

        let mut state = TransferState {
            resource_id,
            chunk_count: None,
            index: 0,
        };
        let mut buffer = vec![0u8; chunk_bytes];

        loop {
            let filled = fill(&mut reader, &mut buffer).await?;
            if filled == 0 {
                break;
            }

            let chunk_url = format!("{url}/chunks/{}", state.index);
            let request = HttpRequest::put(&chunk_url)
                .bytes("application/octet-stream", buffer[..filled].to_vec());
            let response = self.connection.send(request).await?;
            if !response.is_success() {
                return Err(state.abort(format!("chunk upload returned HTTP {}", response.status)));
            }

            tracing::debug!(resource_id, chunk = state.index, bytes = filled, "chunk uploaded");
            state.index += 1;
        }

        let sent = state.index;
        self.post_metadata(&format!("{url}/complete"), resource_id, i64::from(sent))
            .await?;
        tracing::info!(resource_id, chunks = sent, "upload complete");

        Ok(sent)
    }

    async fn post_metadata(&self, url: &str, resource_id: &str, chunk_count: i64) -> Result<()> {
        let body = serde_json::json!({ "id": resource_id, "chunkCount": chunk_count });
        let response = self.connection.send(HttpRequest::post(url).json(&body)?).await?;
        if !response.is_success() {
            return Err(Error::Http {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(())
    }

    /// Download a file by concatenating its chunks in order
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceNotFound`] when the lookup does not know the file
    /// - [`Error::TransferAborted`] when a chunk is empty or not returned
    pub async fn download(&self, resource_id: &str) -> Result<Vec<u8>> {
        let counts = self.lookup.chunk_counts().await?;
        let count = *counts
            .get(resource_id)
            .ok_or_else(|| Error::ResourceNotFound(format!("file {resource_id}")))?;

        let mut state = TransferState {
            resource_id,
            chunk_count: None,
            index: 0,
        };
        let count = u32::try_from(count)
            .map_err(|_| state.abort(format!("file has no completed upload (chunkCount {count})")))?;
        state.chunk_count = Some(count);

        let url = self.resource_url(resource_id);
        tracing::info!(resource_id, chunks = count, "starting download");

        let mut data = Vec::new();
        while state.index < count {
            let chunk_url = format!("{url}/chunks/{}", state.index);
            let response = self.connection.send(HttpRequest::get(&chunk_url)).await?;
            if !response.is_success() {
                return Err(state.abort(format!("chunk download returned HTTP {}", response.status)));
            }
            if response.body.is_empty() {
                return Err(state.abort("chunk body is empty"));
            }

            tracing::debug!(resource_id, chunk = state.index, bytes = response.body.len(), "chunk downloaded");
            data.extend_from_slice(&response.body);
            state.index += 1;
        }

        tracing::info!(resource_id, bytes = data.len(), "download complete");
        Ok(data)
    }
}

fn validate_chunk_size(chunk_size_mb: u32) -> Result<()> {
    if (1..=MAX_CHUNK_SIZE_MB).contains(&chunk_size_mb) {
        Ok(())
    } else {
        Err(Error::InvalidChunkSize { chunk_size_mb })
    }
}

/// Read until `buffer` is full or the reader is exhausted
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialHandle};
    use crate::resources::ResourceType;
    use crate::test_helpers::{Reply, ScriptedTransport};
    use crate::transport::Method;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    const FILE_URL: &str = "https://api.example.com/2/0/workspaces/ws/models/m/files/113000000001";

    struct FixedLookup(HashMap<String, i64>);

    #[async_trait]
    impl ResourceLookup for FixedLookup {
        async fn chunk_counts(&self) -> Result<HashMap<String, i64>> {
            Ok(self.0.clone())
        }

        async fn resource_ids(&self, _resource: ResourceType) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    fn transfer(transport: Arc<ScriptedTransport>, counts: &[(&str, i64)]) -> ChunkedTransfer {
        let connection = Connection::new(
            transport,
            CredentialHandle::new(Credential::new("t", chrono::Utc::now())),
            "https://api.example.com/2/0",
            "ws",
            "m",
        );
        let lookup = FixedLookup(counts.iter().map(|(k, v)| (k.to_string(), *v)).collect());
        ChunkedTransfer::new(connection, Arc::new(lookup))
    }

    fn upload_routes(transport: &ScriptedTransport, chunks: u32) {
        transport.on(Method::Post, FILE_URL, vec![Reply::status(204)]);
        transport.on(Method::Post, format!("{FILE_URL}/complete"), vec![Reply::status(204)]);
        for i in 0..chunks {
            transport.on(Method::Put, format!("{FILE_URL}/chunks/{i}"), vec![Reply::status(204)]);
        }
    }

    #[tokio::test]
    async fn test_upload_130_mib_in_50_mib_chunks() {
        let transport = Arc::new(ScriptedTransport::new());
        upload_routes(&transport, 3);
        let data: Vec<u8> = (0..130 * MIB).map(|i| (i % 251) as u8).collect();

        let sent = transfer(transport.clone(), &[])
            .upload("113000000001", 50, &data)
            .await
            .unwrap();
        assert_eq!(sent, 3);

        let requests = transport.requests();
        assert_eq!(
            transport.calls(),
            vec![
                format!("POST {FILE_URL}"),
                format!("PUT {FILE_URL}/chunks/0"),
                format!("PUT {FILE_URL}/chunks/1"),
                format!("PUT {FILE_URL}/chunks/2"),
                format!("POST {FILE_URL}/complete"),
            ]
        );
        let sizes: Vec<usize> = requests[1..4]
            .iter()
            .map(|r| r.body.as_ref().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![50 * MIB, 50 * MIB, 30 * MIB]);

        let reassembled = requests[1..4]
            .iter()
            .flat_map(|r| r.body.as_ref().unwrap().iter().copied());
        assert!(reassembled.eq(data.iter().copied()), "chunks must reassemble to the source");

        assert_eq!(
            requests[1].header_value("Content-Type"),
            Some("application/octet-stream")
        );
        let metadata: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(metadata, json!({"id": "113000000001", "chunkCount": -1}));
    }

    #[tokio::test]
    async fn test_chunk_count_matches_ceiling_division() {
        for (len, chunk_mb, expected) in [(MIB, 1, 1), (MIB + 1, 1, 2), (3 * MIB - 1, 1, 3)] {
            let transport = Arc::new(ScriptedTransport::new());
            upload_routes(&transport, expected);
            let data = vec![7u8; len];

            let sent = transfer(transport.clone(), &[])
                .upload("113000000001", chunk_mb, &data)
                .await
                .unwrap();
            assert_eq!(sent, expected, "{len} bytes in {chunk_mb} MiB chunks");
        }
    }

    #[tokio::test]
    async fn test_zero_length_upload_sends_no_chunks() {
        let transport = Arc::new(ScriptedTransport::new());
        upload_routes(&transport, 0);

        let sent = transfer(transport.clone(), &[])
            .upload("113000000001", 10, &[])
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert_eq!(
            transport.calls(),
            vec![format!("POST {FILE_URL}"), format!("POST {FILE_URL}/complete")]
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_skips_completion() {
        let transport = Arc::new(ScriptedTransport::new());
        upload_routes(&transport, 1);
        transport.on(Method::Put, format!("{FILE_URL}/chunks/1"), vec![Reply::status(500)]);
        let data = vec![1u8; 2 * MIB + 10];

        let result = transfer(transport.clone(), &[])
            .upload("113000000001", 1, &data)
            .await;

        match result {
            Err(Error::TransferAborted { chunk, .. }) => assert_eq!(chunk, 1),
            other => panic!("expected aborted transfer, got {other:?}"),
        }
        assert!(!transport.calls().iter().any(|c| c.ends_with("/complete")));
        assert!(!transport.calls().iter().any(|c| c.ends_with("/chunks/2")));
    }

    #[tokio::test]
    async fn test_invalid_chunk_size_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        for size in [0, 51] {
            assert!(matches!(
                transfer(transport.clone(), &[]).upload("113000000001", size, b"x").await,
                Err(Error::InvalidChunkSize { .. })
            ));
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_file_from_disk() {
        let transport = Arc::new(ScriptedTransport::new());
        upload_routes(&transport, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        tokio::fs::write(&path, vec![b'x'; MIB + 5]).await.unwrap();

        let sent = transfer(transport.clone(), &[])
            .upload_file("113000000001", 1, &path)
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(transport.requests()[2].body.as_ref().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_download_concatenates_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        for (i, part) in ["a,b\n", "1,2\n", "3,4\n"].iter().enumerate() {
            transport.on(Method::Get, format!("{FILE_URL}/chunks/{i}"), vec![Reply::bytes(*part)]);
        }

        let data = transfer(transport.clone(), &[("113000000001", 3)])
            .download("113000000001")
            .await
            .unwrap();

        assert_eq!(data, b"a,b\n1,2\n3,4\n");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_download_aborts_on_empty_chunk() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, format!("{FILE_URL}/chunks/0"), vec![Reply::bytes("a")]);
        transport.on(Method::Get, format!("{FILE_URL}/chunks/1"), vec![Reply::bytes("")]);

        let result = transfer(transport.clone(), &[("113000000001", 3)])
            .download("113000000001")
            .await;

        assert!(matches!(result, Err(Error::TransferAborted { chunk: 1, .. })));
        assert_eq!(transport.requests().len(), 2, "no retry and no further chunks");
    }

    #[tokio::test]
    async fn test_download_unknown_file() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = transfer(transport.clone(), &[]).download("113000000001").await;
        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
        assert!(transport.requests().is_empty());
    }
}
