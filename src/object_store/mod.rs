mod local;
mod r2;

pub use local::LocalStore;
pub use r2::{R2Config, R2Store};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Signed URL generation failed: {0}")]
    SignedUrl(String),
}

/// Abstraction over object storage backends.
/// Keys are generated names -- the raw blobs are meaningless without the
/// descriptor stored in the metadata DB.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload bytes under a key with a content type and a small metadata bag
    /// (uploader, category).
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// Idempotent: deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Stable URL for objects marked public. Pure URL construction, no I/O.
    fn public_url(&self, key: &str) -> String;

    /// Time-bounded signed URL for private objects.
    async fn signed_url(&self, key: &str, expires_in: Duration)
        -> Result<String, ObjectStoreError>;
}
