use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use file_router::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use file_router::placement::{PlacementPolicy, StorageClass};
use file_router::router::{
    decode_data_uri, RouterError, StorageRouter, UploadInput, UploadMetadata,
};

fn local_router(dir: &tempfile::TempDir) -> StorageRouter {
    let store = LocalStore::new(dir.path(), "http://localhost:8080/objects").unwrap();
    StorageRouter::new(
        PlacementPolicy::default(),
        Arc::new(store),
        Duration::from_secs(3600),
    )
}

fn upload(name: &str, mime: &str, bytes: &[u8]) -> UploadInput {
    UploadInput {
        bytes: Bytes::copy_from_slice(bytes),
        mime_type: mime.to_string(),
        original_name: name.to_string(),
        byte_size: bytes.len() as u64,
        is_public: false,
        metadata: UploadMetadata::default(),
    }
}

// ============================================================================
// Failure-injecting stores
// ============================================================================

/// Rejects every upload; used to exercise the UploadFailed path.
struct RejectingStore;

#[async_trait]
impl ObjectStore for RejectingStore {
    async fn put(
        &self,
        _key: &str,
        _data: Bytes,
        _content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::Backend("bucket unavailable".to_string()))
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        Err(ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::Backend("bucket unavailable".to_string()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, ObjectStoreError> {
        Ok(false)
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://public.example/{key}")
    }

    async fn signed_url(
        &self,
        _key: &str,
        _expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        Err(ObjectStoreError::SignedUrl("credentials expired".to_string()))
    }
}

/// Accepts uploads but counts and fails every signed-URL request.
struct UnsignableStore {
    sign_attempts: AtomicUsize,
}

impl UnsignableStore {
    fn new() -> Self {
        Self {
            sign_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStore for UnsignableStore {
    async fn put(
        &self,
        _key: &str,
        _data: Bytes,
        _content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<(), ObjectStoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        Err(ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), ObjectStoreError> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool, ObjectStoreError> {
        Ok(true)
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://public.example/{key}")
    }

    async fn signed_url(
        &self,
        _key: &str,
        _expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        self.sign_attempts.fetch_add(1, Ordering::SeqCst);
        Err(ObjectStoreError::SignedUrl("backend outage".to_string()))
    }
}

// ============================================================================
// store
// ============================================================================

#[tokio::test]
async fn inline_round_trip_returns_exact_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let bytes = b"\x89PNG\r\n\x1a\nfake image payload";
    let descriptor = router
        .store(upload("photo.png", "image/png", bytes))
        .await
        .unwrap();

    assert_eq!(descriptor.storage_class, StorageClass::InlineDb);
    assert_eq!(descriptor.byte_size, bytes.len() as u64);

    // resolve_download returns the data URI verbatim, no I/O needed
    let url = router.resolve_download(&descriptor, None).await.unwrap();
    assert_eq!(url, descriptor.locator);

    let (mime, decoded) = decode_data_uri(&url).unwrap();
    assert_eq!(mime, "image/png");
    assert_eq!(decoded, bytes);
}

#[tokio::test]
async fn object_store_path_uploads_and_keys_by_generated_name() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let descriptor = router
        .store(upload("transcript.pdf", "application/pdf", b"%PDF-1.4 tiny"))
        .await
        .unwrap();

    // A 13-byte PDF still goes to the object store (priority type)
    assert_eq!(descriptor.storage_class, StorageClass::ObjectStore);
    // Locator is the object key, which is the generated name
    assert_eq!(descriptor.locator, descriptor.file_name);
    assert_ne!(descriptor.file_name, "transcript.pdf");
    assert!(descriptor.file_name.ends_with(".pdf"));

    // Bytes actually landed in the backend under that key
    let stored = router.object_store().get(&descriptor.locator).await.unwrap();
    assert_eq!(stored, Bytes::from_static(b"%PDF-1.4 tiny"));
}

#[tokio::test]
async fn fetch_content_reads_both_classes() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let inline = router
        .store(upload("note.txt", "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(inline.storage_class, StorageClass::InlineDb);
    assert_eq!(router.fetch_content(&inline).await.unwrap(), "hello");

    let object = router
        .store(upload("blob.bin", "application/octet-stream", b"opaque"))
        .await
        .unwrap();
    assert_eq!(object.storage_class, StorageClass::ObjectStore);
    assert_eq!(router.fetch_content(&object).await.unwrap(), "opaque");
}

#[tokio::test]
async fn store_rejects_malformed_input() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let mut wrong_size = upload("a.txt", "text/plain", b"abc");
    wrong_size.byte_size = 99;
    assert!(matches!(
        router.store(wrong_size).await,
        Err(RouterError::InvalidInput(_))
    ));

    let unnamed = upload("  ", "text/plain", b"abc");
    assert!(matches!(
        router.store(unnamed).await,
        Err(RouterError::InvalidInput(_))
    ));

    let untyped = upload("a.txt", "", b"abc");
    assert!(matches!(
        router.store(untyped).await,
        Err(RouterError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn upload_failure_surfaces_and_produces_no_descriptor() {
    let router = StorageRouter::new(
        PlacementPolicy::default(),
        Arc::new(RejectingStore),
        Duration::from_secs(3600),
    );

    let result = router
        .store(upload("transcript.pdf", "application/pdf", b"%PDF"))
        .await;
    assert!(matches!(result, Err(RouterError::UploadFailed(_))));
}

// ============================================================================
// store_batch
// ============================================================================

#[tokio::test]
async fn batch_partial_failure_keeps_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    // The middle file carries a byte_size mismatch and must fail alone
    let mut poisoned = upload("bad.txt", "text/plain", b"bad");
    poisoned.byte_size = 12345;

    let outcome = router
        .store_batch(vec![
            upload("one.txt", "text/plain", b"one"),
            poisoned,
            upload("two.txt", "text/plain", b"two"),
        ])
        .await;

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].original_name, "bad.txt");

    let names: Vec<&str> = outcome
        .succeeded
        .iter()
        .map(|d| d.original_name.as_str())
        .collect();
    assert!(names.contains(&"one.txt"));
    assert!(names.contains(&"two.txt"));
}

#[tokio::test]
async fn batch_backend_failure_keeps_inline_siblings() {
    // Backend rejects every upload, so object-store files fail while inline
    // files (no network) still succeed.
    let router = StorageRouter::new(
        PlacementPolicy::default(),
        Arc::new(RejectingStore),
        Duration::from_secs(3600),
    );

    let outcome = router
        .store_batch(vec![
            upload("essay.pdf", "application/pdf", b"%PDF"),
            upload("photo.png", "image/png", b"png bytes"),
        ])
        .await;

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].original_name, "photo.png");
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].original_name, "essay.pdf");
    assert!(matches!(
        outcome.failed[0].error,
        RouterError::UploadFailed(_)
    ));
}

// ============================================================================
// resolve_download
// ============================================================================

#[tokio::test]
async fn public_files_resolve_to_stable_urls() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let mut input = upload("blob.bin", "application/octet-stream", b"opaque");
    input.is_public = true;
    let descriptor = router.store(input).await.unwrap();

    let url = router.resolve_download(&descriptor, None).await.unwrap();
    assert_eq!(
        url,
        format!("http://localhost:8080/objects/{}", descriptor.file_name)
    );
}

#[tokio::test]
async fn signed_url_failure_never_falls_back_to_public() {
    let store = Arc::new(UnsignableStore::new());
    let router = StorageRouter::new(
        PlacementPolicy::default(),
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        Duration::from_secs(3600),
    );

    let descriptor = router
        .store(upload("private.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();
    assert!(!descriptor.is_public);

    let result = router.resolve_download(&descriptor, None).await;
    assert!(matches!(
        result,
        Err(RouterError::SignedUrlGenerationFailed(_))
    ));

    // One bounded retry: exactly two attempts, then the error surfaces
    assert_eq!(store.sign_attempts.load(Ordering::SeqCst), 2);

    // The same file marked public still resolves without signing
    let url = router
        .resolve_download(&descriptor, Some(true))
        .await
        .unwrap();
    assert!(url.starts_with("http://public.example/"));
}

// ============================================================================
// delete_backing
// ============================================================================

#[tokio::test]
async fn delete_backing_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let descriptor = router
        .store(upload("doc.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();

    assert!(router.delete_backing(&descriptor).await);
    // Second delete: backing is already gone, still success
    assert!(router.delete_backing(&descriptor).await);
    assert!(!router.object_store().exists(&descriptor.locator).await.unwrap());
}

#[tokio::test]
async fn delete_backing_swallows_backend_failure() {
    let router = StorageRouter::new(
        PlacementPolicy::default(),
        Arc::new(RejectingStore),
        Duration::from_secs(3600),
    );

    let descriptor = file_router::router::FileDescriptor {
        file_name: "k.pdf".to_string(),
        original_name: "k.pdf".to_string(),
        storage_class: StorageClass::ObjectStore,
        locator: "k.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        byte_size: 4,
        is_public: false,
    };

    // Reported as not-clean, but never an error the caller must handle
    assert!(!router.delete_backing(&descriptor).await);
}

#[tokio::test]
async fn delete_backing_for_inline_is_trivial() {
    let dir = tempfile::tempdir().unwrap();
    let router = local_router(&dir);

    let descriptor = router
        .store(upload("photo.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(descriptor.storage_class, StorageClass::InlineDb);

    assert!(router.delete_backing(&descriptor).await);
}
