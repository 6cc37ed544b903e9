use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::router::RouterError;
use crate::storage::models::FileRecord;
use crate::AppState;

/// Serve file content by record id.
/// Route: GET /files/:id/content
pub async fn serve_file_content(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    serve_record(&state, &file).await
}

/// Serve file content by generated name. Local-backend public URLs point at
/// this route.
/// Route: GET /objects/*file_name
pub async fn serve_object(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(file_name): axum::extract::Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .db
        .get_file_by_name(&file_name)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    serve_record(&state, &file).await
}

async fn serve_record(state: &AppState, file: &FileRecord) -> Result<Response, ApiError> {
    if !file.active {
        return Err(ApiError::gone("File has been deleted"));
    }

    // Inline descriptors decode locally; object-store descriptors fetch
    // from the backend.
    let data = state
        .router
        .fetch_content(&file.descriptor)
        .await
        .map_err(|e| match &e {
            RouterError::FetchFailed(crate::object_store::ObjectStoreError::NotFound(_)) => {
                ApiError::not_found("File content not found")
            }
            _ => ApiError::internal(format!("Failed to retrieve file: {e}")),
        })?;

    // Build response with appropriate headers
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.descriptor
            .mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(file.descriptor.byte_size),
    );

    // Content-Disposition carries the display name, not the storage key
    let filename = file
        .descriptor
        .original_name
        .replace(['"', '\r', '\n'], "_");
    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Cache for 1 hour (content is immutable once uploaded, only metadata changes)
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );

    Ok(response)
}
