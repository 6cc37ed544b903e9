//! Storage router: decides, executes, and later resolves storage placement
//! for one file at a time.
//!
//! The router is stateless across calls. It never writes the metadata
//! database -- `store` returns a [`FileDescriptor`] value and persistence is
//! the caller's responsibility, which keeps the router agnostic of the
//! record schema. On any failure no partial state is produced: a caller that
//! gets an error has nothing to persist.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::placement::{Placement, PlacementPolicy, StorageClass};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid upload input: {0}")]
    InvalidInput(String),
    #[error("Object store upload failed: {0}")]
    UploadFailed(#[source] ObjectStoreError),
    #[error("Object store read failed: {0}")]
    FetchFailed(#[source] ObjectStoreError),
    #[error("Signed URL generation failed: {0}")]
    SignedUrlGenerationFailed(String),
    #[error("Inline payload encoding error: {0}")]
    Encoding(String),
}

/// Optional descriptive metadata attached to an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub uploaded_by: Option<String>,
    pub category: Option<String>,
}

/// One inbound file. All required fields are validated at the boundary;
/// malformed input is rejected rather than silently defaulted.
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_name: String,
    pub byte_size: u64,
    pub is_public: bool,
    pub metadata: UploadMetadata,
}

impl UploadInput {
    fn validate(&self) -> Result<(), RouterError> {
        if self.original_name.trim().is_empty() {
            return Err(RouterError::InvalidInput(
                "original_name must not be empty".to_string(),
            ));
        }
        if self.mime_type.trim().is_empty() {
            return Err(RouterError::InvalidInput(
                "mime_type must not be empty".to_string(),
            ));
        }
        if self.byte_size != self.bytes.len() as u64 {
            return Err(RouterError::InvalidInput(format!(
                "byte_size {} does not match payload length {}",
                self.byte_size,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

/// Normalized description of where a stored file lives.
///
/// `locator` holds the object key for `ObjectStore`, or the full
/// `data:<mime>;base64,<payload>` URI for `InlineDb`. Both `storage_class`
/// and `locator` are write-once after upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Generated unique name; never the user-supplied one.
    pub file_name: String,
    /// User-supplied name, retained for display only.
    pub original_name: String,
    pub storage_class: StorageClass,
    pub locator: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub is_public: bool,
}

/// A file that failed inside a batch upload.
#[derive(Debug)]
pub struct BatchFailure {
    pub original_name: String,
    pub error: RouterError,
}

/// Result of a batch upload: per-file outcomes, never an aborted batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<FileDescriptor>,
    pub failed: Vec<BatchFailure>,
}

pub struct StorageRouter {
    policy: PlacementPolicy,
    store: Arc<dyn ObjectStore>,
    signed_url_expiry: Duration,
}

impl StorageRouter {
    pub fn new(
        policy: PlacementPolicy,
        store: Arc<dyn ObjectStore>,
        signed_url_expiry: Duration,
    ) -> Self {
        Self {
            policy,
            store,
            signed_url_expiry,
        }
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Classify without transferring any bytes. Pure and deterministic.
    pub fn classify(&self, mime_type: &str, byte_size: u64) -> Placement {
        self.policy.classify(mime_type, byte_size)
    }

    /// Upload one file to the backend its classification selects and return
    /// the descriptor for the caller to persist. On error nothing was
    /// persisted anywhere the caller needs to clean up, except a possible
    /// orphaned object when the failure raced the upload itself -- the
    /// caller must not create a database record in that case.
    pub async fn store(&self, input: UploadInput) -> Result<FileDescriptor, RouterError> {
        input.validate()?;

        let placement = self.classify(&input.mime_type, input.byte_size);

        let (file_name, locator) = match placement.class {
            StorageClass::ObjectStore => {
                let key = generate_object_key(&input.original_name);
                let mut object_meta = HashMap::new();
                object_meta.insert(
                    "original-name".to_string(),
                    sanitize_metadata_value(&input.original_name),
                );
                if let Some(ref uploader) = input.metadata.uploaded_by {
                    object_meta.insert("uploaded-by".to_string(), sanitize_metadata_value(uploader));
                }
                if let Some(ref category) = input.metadata.category {
                    object_meta.insert("category".to_string(), sanitize_metadata_value(category));
                }

                self.store
                    .put(&key, input.bytes, &input.mime_type, &object_meta)
                    .await
                    .map_err(RouterError::UploadFailed)?;

                (key.clone(), key)
            }
            StorageClass::InlineDb => {
                // No network call on this path: encoding happens locally and
                // the payload travels with the descriptor.
                let data_uri = encode_data_uri(&input.mime_type, &input.bytes);
                (generate_object_key(&input.original_name), data_uri)
            }
        };

        tracing::debug!(
            file_name = %file_name,
            class = ?placement.class,
            reason = ?placement.reason,
            size_bytes = input.byte_size,
            "Stored file"
        );

        Ok(FileDescriptor {
            file_name,
            original_name: input.original_name,
            storage_class: placement.class,
            locator,
            mime_type: input.mime_type,
            byte_size: input.byte_size,
            is_public: input.is_public,
        })
    }

    /// Store many files concurrently. Files are upload-independent, so one
    /// failure never aborts its siblings; errors are collected per file.
    pub async fn store_batch(&self, inputs: Vec<UploadInput>) -> BatchOutcome {
        let results = futures::future::join_all(inputs.into_iter().map(|input| {
            let name = input.original_name.clone();
            async move { (name, self.store(input).await) }
        }))
        .await;

        let mut outcome = BatchOutcome::default();
        for (original_name, result) in results {
            match result {
                Ok(descriptor) => outcome.succeeded.push(descriptor),
                Err(error) => {
                    tracing::warn!(original_name = %original_name, error = %error, "Batch upload item failed");
                    outcome.failed.push(BatchFailure {
                        original_name,
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Resolve a descriptor to something a client can fetch.
    ///
    /// Inline descriptors return their data URI verbatim. Object-store
    /// descriptors return the stable public URL when the file is public,
    /// otherwise a signed URL. A signed-URL failure surfaces as an error --
    /// handing out a public URL for a file that was marked private would be
    /// a security regression, so there is no fallback.
    pub async fn resolve_download(
        &self,
        descriptor: &FileDescriptor,
        is_public_override: Option<bool>,
    ) -> Result<String, RouterError> {
        match descriptor.storage_class {
            StorageClass::InlineDb => Ok(descriptor.locator.clone()),
            StorageClass::ObjectStore => {
                let public = is_public_override.unwrap_or(descriptor.is_public);
                if public {
                    return Ok(self.store.public_url(&descriptor.locator));
                }

                // One bounded retry; the backend call is otherwise unretried.
                let mut last_err = None;
                for _ in 0..2 {
                    match self
                        .store
                        .signed_url(&descriptor.locator, self.signed_url_expiry)
                        .await
                    {
                        Ok(url) => return Ok(url),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(RouterError::SignedUrlGenerationFailed(
                    last_err
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                ))
            }
        }
    }

    /// Fetch the raw bytes a descriptor points at, from either backend.
    pub async fn fetch_content(
        &self,
        descriptor: &FileDescriptor,
    ) -> Result<Bytes, RouterError> {
        match descriptor.storage_class {
            StorageClass::InlineDb => {
                let (_, bytes) = decode_data_uri(&descriptor.locator)?;
                Ok(Bytes::from(bytes))
            }
            StorageClass::ObjectStore => self
                .store
                .get(&descriptor.locator)
                .await
                .map_err(RouterError::FetchFailed),
        }
    }

    /// Best-effort removal of the backing bytes. Returns whether the backing
    /// store is known clean; `false` is logged, not raised -- authoritative
    /// state lives in the metadata database and an orphaned blob is an
    /// acceptable failure mode, a dangling record is not.
    pub async fn delete_backing(&self, descriptor: &FileDescriptor) -> bool {
        match descriptor.storage_class {
            // The record is the only copy; nothing to clean up.
            StorageClass::InlineDb => true,
            StorageClass::ObjectStore => match self.store.delete(&descriptor.locator).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        key = %descriptor.locator,
                        error = %e,
                        "Failed to delete backing object; leaving orphan"
                    );
                    false
                }
            },
        }
    }
}

// ============================================================================
// Naming
// ============================================================================

/// Generate a collision-resistant object key: unix-millis timestamp, random
/// hex suffix, and a sanitized extension from the original name. The
/// user-supplied name never reaches the key, so it cannot carry path
/// traversal or header injection.
pub fn generate_object_key(original_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    match sanitized_extension(original_name) {
        Some(ext) => format!("{timestamp}-{suffix:08x}.{ext}"),
        None => format!("{timestamp}-{suffix:08x}"),
    }
}

/// Extension restricted to an allow-list of lowercase alphanumerics, bounded
/// length. Anything else is dropped entirely.
fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext = original_name.rsplit_once('.')?.1;
    if ext.is_empty() || ext.len() > 10 {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

fn sanitize_metadata_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(256)
        .collect()
}

// ============================================================================
// Data URI codec
// ============================================================================

/// Wrap bytes as a self-describing `data:<mime>;base64,<payload>` URI.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{payload}")
}

/// Decode a data URI back into its MIME type and raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), RouterError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RouterError::Encoding("missing data: prefix".to_string()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| RouterError::Encoding("missing ;base64, separator".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| RouterError::Encoding(format!("invalid base64 payload: {e}")))?;
    Ok((mime_type.to_string(), bytes))
}
