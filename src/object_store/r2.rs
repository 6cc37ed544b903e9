use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{ObjectStore, ObjectStoreError};

/// R2 (S3-compatible) object store backend.
pub struct R2Store {
    client: Client,
    bucket: String,
    endpoint: String,
    /// Stable base URL for public objects (e.g. an R2 public bucket domain).
    public_base_url: Option<String>,
}

pub struct R2Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub public_base_url: Option<String>,
    /// Bound on every object store call so a backend outage cannot hang a
    /// request indefinitely.
    pub operation_timeout: Duration,
}

impl R2Store {
    pub async fn new(config: R2Config) -> Result<Self, anyhow::Error> {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "static",
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.operation_timeout)
            .build();

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .load()
            .await;

        // Path-style addressing: required by most S3-compatible providers.
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            public_base_url: config
                .public_base_url
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        let size = data.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data));

        for (k, v) in metadata {
            request = request.metadata(k, v);
        }

        request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                "R2 upload failed"
            );
            ObjectStoreError::Backend(format!("R2 upload failed: {e}"))
        })?;

        tracing::debug!(bucket = %self.bucket, key = %key, size_bytes = size, "R2 upload complete");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    ObjectStoreError::NotFound(key.to_string())
                }
                _ => {
                    tracing::error!(error = %e, bucket = %self.bucket, key = %key, "R2 download failed");
                    ObjectStoreError::Backend(format!("R2 download failed: {e}"))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("R2 body read failed: {e}")))?;

        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        // S3 DeleteObject succeeds for missing keys, which gives us the
        // idempotent-delete contract for free.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "R2 delete failed");
                ObjectStoreError::Backend(format!("R2 delete failed: {e}"))
            })?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
                {
                    Ok(false)
                }
                _ => Err(ObjectStoreError::Backend(format!("R2 head failed: {e}"))),
            },
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/{}/{key}", self.endpoint, self.bucket),
        }
    }

    async fn signed_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| ObjectStoreError::SignedUrl(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "R2 presign failed");
                ObjectStoreError::SignedUrl(e.to_string())
            })?;

        Ok(presigned.uri().to_string())
    }
}
