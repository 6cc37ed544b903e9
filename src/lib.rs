//! file-router - hybrid file-storage placement service
//!
//! This crate decides, per uploaded file, whether its bytes go to an
//! S3-compatible object store (R2) or are inlined as a base64 data URI in the
//! metadata database, with:
//! - A pure, deterministic placement policy (MIME type + size classification)
//! - A storage router with uniform upload / download-resolution / delete
//!   semantics across both placements
//! - Swappable object storage backends (local filesystem, R2)
//! - redb embedded database for file descriptors (ACID, MVCC, crash-safe)
//! - REST API with multipart upload support (single file or batch)

pub mod api;
pub mod config;
pub mod object_store;
pub mod placement;
pub mod router;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use router::StorageRouter;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub router: StorageRouter,
}
