//! Storage for tailored output documents.
//!
//! `AppState` holds an `Arc<dyn DocumentStore>`; production uses S3 (or
//! MinIO locally), tests use the in-memory store.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A stored output document.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub filename: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, id: Uuid, filename: &str, bytes: Bytes) -> Result<()>;

    /// `Ok(None)` when no document has that id.
    async fn get(&self, id: Uuid) -> Result<Option<StoredDocument>>;
}

// ────────────────────────────────────────────────────────────────────────────
// S3
// ────────────────────────────────────────────────────────────────────────────

pub struct S3DocumentStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3DocumentStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn object_key(id: Uuid) -> String {
        format!("tailored/{id}.docx")
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    async fn put(&self, id: Uuid, filename: &str, bytes: Bytes) -> Result<()> {
        let key = Self::object_key(id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(DOCX_CONTENT_TYPE)
            .metadata("filename", filename)
            .send()
            .await
            .map_err(|e| anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded tailored document to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredDocument>> {
        let key = Self::object_key(id);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Ok(None);
                }
                return Err(anyhow!("S3 download failed: {service_error}"));
            }
        };

        let filename = output
            .metadata()
            .and_then(|m| m.get("filename").cloned())
            .unwrap_or_else(|| format!("{id}.docx"));
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("S3 body read failed: {e}"))?
            .into_bytes();

        Ok(Some(StoredDocument { filename, bytes }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory (tests)
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: tokio::sync::RwLock<std::collections::HashMap<Uuid, StoredDocument>>,
}

#[cfg(test)]
#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, id: Uuid, filename: &str, bytes: Bytes) -> Result<()> {
        self.documents.write().await.insert(
            id,
            StoredDocument {
                filename: filename.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoredDocument>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }
}
