mod admin;
mod content;
mod files;

pub use admin::{admin_purge, health};
pub use content::{serve_file_content, serve_object};
pub use files::{delete_file, get_file, list_files, resolve_download, upload_files};
