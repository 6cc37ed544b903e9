use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::router::{FileDescriptor, UploadMetadata};

/// A file record stored in redb: the persisted [`FileDescriptor`] plus the
/// record's own identity and lifecycle fields.
///
/// `descriptor.storage_class` and `descriptor.locator` are write-once --
/// there is no update path for them. Deletion is soft: `active` flips to
/// false and the record stays (the backing bytes are cleaned up best-effort,
/// separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub descriptor: FileDescriptor,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Wrap a freshly produced descriptor into a new active record.
    pub fn create(descriptor: FileDescriptor, metadata: &UploadMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            descriptor,
            uploaded_by: metadata.uploaded_by.clone(),
            category: metadata.category.clone(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
