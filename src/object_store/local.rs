use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
///
/// URLs are built from a configured base; there is no access control locally,
/// so signed URLs degrade to the same stable URL.
pub struct LocalStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        public_base_url: impl Into<String>,
    ) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key);
        Ok(path.exists())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    async fn signed_url(
        &self,
        key: &str,
        _expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        Ok(self.public_url(key))
    }
}
