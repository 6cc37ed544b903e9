use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::placement::StorageClass;
use crate::router::{UploadInput, UploadMetadata};
use crate::storage::models::FileRecord;
use crate::storage::ListFilter;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub active: bool,
    pub byte_size: u64,
    pub category: Option<String>,
    pub created_at: String,
    pub file_name: String,
    pub id: String,
    pub is_public: bool,
    pub mime_type: String,
    pub original_name: String,
    pub storage_class: StorageClass,
    pub uploaded_by: Option<String>,
    pub updated_at: String,
}

/// Per-file outcomes for an upload batch. Partial failure is a normal
/// result, not an aborted request.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: Vec<FileResponse>,
    pub errors: Vec<UploadItemError>,
}

#[derive(Debug, Serialize)]
pub struct UploadItemError {
    pub original_name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    /// A fetchable target: an HTTP(S) URL for object-store files, or the
    /// data URI itself for inline files. Consumers must handle both shapes.
    pub url: String,
    pub storage_class: StorageClass,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Overrides the stored visibility for this resolution only.
    #[serde(default)]
    pub public: Option<bool>,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let mut pending: Vec<(bytes::Bytes, Option<String>, Option<String>)> = Vec::new();
    let mut category: Option<String> = None;
    let mut uploaded_by: Option<String> = None;
    let mut is_public = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }

                pending.push((data, file_name, content_type));
            }
            "category" => {
                category = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid category: {e}")))?,
                );
            }
            "uploaded_by" => {
                uploaded_by = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid uploaded_by: {e}")))?,
                );
            }
            "is_public" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid is_public: {e}")))?;
                is_public = text == "true" || text == "1";
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    if pending.is_empty() {
        return Err(ApiError::bad_request("at least one file field is required"));
    }

    let metadata = UploadMetadata {
        uploaded_by,
        category,
    };

    let inputs: Vec<UploadInput> = pending
        .into_iter()
        .map(|(data, file_name, content_type)| {
            let original_name = file_name.unwrap_or_else(|| "unnamed".to_string());
            // MIME type: declared multipart Content-Type, or guess from the
            // filename, or the opaque fallback. Classification treats it as
            // untrusted input either way.
            let mime_type = content_type
                .filter(|ct| ct != "application/octet-stream")
                .or_else(|| {
                    mime_guess::from_path(&original_name)
                        .first()
                        .map(|m| m.to_string())
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());

            UploadInput {
                byte_size: data.len() as u64,
                bytes: data,
                mime_type,
                original_name,
                is_public,
                metadata: metadata.clone(),
            }
        })
        .collect();

    let outcome = state.router.store_batch(inputs).await;

    // Persist only complete uploads -- a failed item never gets a record.
    let mut uploaded = Vec::with_capacity(outcome.succeeded.len());
    for descriptor in outcome.succeeded {
        let record = FileRecord::create(descriptor, &metadata);
        if let Err(e) = state.db.put_file(&record) {
            // The bytes are already placed; drop them rather than leave a
            // blob no record points at.
            let _ = state.router.delete_backing(&record.descriptor).await;
            return Err(ApiError::internal(e.to_string()));
        }
        tracing::debug!(file_id = %record.id, file_name = %record.descriptor.file_name, "Created file record");
        uploaded.push(file_to_response(&record));
    }

    let errors = outcome
        .failed
        .into_iter()
        .map(|f| UploadItemError {
            original_name: f.original_name,
            message: f.error.to_string(),
        })
        .collect();

    Ok(JSend::success(UploadResponse { uploaded, errors }))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    Ok(JSend::success(file_to_response(&file)))
}

/// Resolve a stored descriptor to a download target. Never hands out a
/// public URL for a private object-store file when signing fails.
pub async fn resolve_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<DownloadParams>,
) -> Result<Json<JSend<DownloadResponse>>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !file.active {
        return Err(ApiError::gone("File has been deleted"));
    }

    let url = state
        .router
        .resolve_download(&file.descriptor, params.public)
        .await?;

    Ok(JSend::success(DownloadResponse {
        url,
        storage_class: file.descriptor.storage_class,
    }))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    // Phase 1: soft-delete the record. The database is the source of truth.
    let deactivated = state
        .db
        .deactivate_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !deactivated {
        return Err(ApiError::gone("File has already been deleted"));
    }

    // Phase 2: best-effort backing cleanup. An orphaned blob is acceptable;
    // failing the request here would not make the record any less deleted.
    if !state.router.delete_backing(&file.descriptor).await {
        tracing::warn!(file_id = %id, "Backing object not cleaned up");
    }

    tracing::debug!(file_id = %id, "Deleted file");
    Ok(JSend::success(()))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let storage_class = params
        .storage_class
        .as_deref()
        .map(parse_storage_class)
        .transpose()?;

    let filter = ListFilter {
        storage_class,
        category: params.category.as_deref(),
        include_inactive: params.include_inactive,
    };

    match state.db.list_files(&filter) {
        Ok(files) => {
            let total = files.len() as u64;
            let items: Vec<FileResponse> = files
                .iter()
                .skip(params.offset as usize)
                .take(params.limit as usize)
                .map(file_to_response)
                .collect();

            Ok(JSendPaginated::success(
                items,
                Pagination {
                    limit: params.limit,
                    offset: params.offset,
                    total,
                },
            ))
        }
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_storage_class(raw: &str) -> Result<StorageClass, ApiError> {
    match raw {
        "object_store" => Ok(StorageClass::ObjectStore),
        "inline_db" => Ok(StorageClass::InlineDb),
        _ => Err(ApiError::bad_request(
            "storage_class must be one of: object_store, inline_db",
        )),
    }
}

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        active: file.active,
        byte_size: file.descriptor.byte_size,
        category: file.category.clone(),
        created_at: file.created_at.to_rfc3339(),
        file_name: file.descriptor.file_name.clone(),
        id: file.id.clone(),
        is_public: file.descriptor.is_public,
        mime_type: file.descriptor.mime_type.clone(),
        original_name: file.descriptor.original_name.clone(),
        storage_class: file.descriptor.storage_class,
        uploaded_by: file.uploaded_by.clone(),
        updated_at: file.updated_at.to_rfc3339(),
    }
}
