use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub placement: PlacementConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes (whole multipart body)
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local,
    R2,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Base URL local-backend object URLs are built from
    pub local_public_base_url: String,
    /// S3-compatible endpoint (required when backend is r2)
    pub r2_endpoint: Option<String>,
    /// Bucket name (required when backend is r2)
    pub r2_bucket: Option<String>,
    pub r2_access_key_id: Option<String>,
    pub r2_secret_access_key: Option<String>,
    /// Region identifier; R2 accepts "auto"
    pub r2_region: String,
    /// Stable base URL for public objects (e.g. a public bucket domain).
    /// Falls back to path-style endpoint/bucket URLs when unset.
    pub r2_public_base_url: Option<String>,
    /// Expiry for signed download URLs, in seconds
    pub signed_url_expiry_secs: u64,
    /// Per-operation timeout for object store calls, in seconds
    pub operation_timeout_secs: u64,
}

/// Knobs for the placement policy. Classification is a pure function of
/// these values plus (mime_type, byte_size) -- nothing here is read from the
/// environment after startup.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    /// Ceiling below which a file may be inlined in the database
    pub inline_max_bytes: u64,
    /// Floor above which a file always goes to the object store
    pub object_store_min_bytes: u64,
    /// MIME types that always route to the object store, regardless of size
    pub priority_types: HashSet<String>,
    /// MIME types eligible for inlining when under the size ceiling
    pub inline_eligible_types: HashSet<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            local_public_base_url: "http://localhost:8080/objects".to_string(),
            r2_endpoint: None,
            r2_bucket: None,
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_region: "auto".to_string(),
            r2_public_base_url: None,
            signed_url_expiry_secs: 3600,
            operation_timeout_secs: 30,
        }
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            inline_max_bytes: 5 * 1024 * 1024,
            object_store_min_bytes: 1024 * 1024,
            priority_types: default_priority_types(),
            inline_eligible_types: default_inline_eligible_types(),
        }
    }
}

/// Documents, spreadsheets, presentations, and archives: rarely small,
/// frequently re-downloaded. Inlining them would bloat the database
/// working set, so they always go to the object store.
fn default_priority_types() -> HashSet<String> {
    [
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "application/zip",
        "application/x-7z-compressed",
        "application/x-rar-compressed",
        "application/gzip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_inline_eligible_types() -> HashSet<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "text/plain",
        "text/csv",
        "application/json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_mime_set(name: &str) -> Option<HashSet<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = env_u64("MAX_UPLOAD_SIZE", 50 * 1024 * 1024); // 50MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "r2" => StorageBackend::R2,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());
        let local_public_base_url = std::env::var("LOCAL_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/objects".to_string());

        let placement_defaults = PlacementConfig::default();
        let placement = PlacementConfig {
            inline_max_bytes: env_u64("INLINE_MAX_BYTES", placement_defaults.inline_max_bytes),
            object_store_min_bytes: env_u64(
                "OBJECT_STORE_MIN_BYTES",
                placement_defaults.object_store_min_bytes,
            ),
            priority_types: env_mime_set("PRIORITY_MIME_TYPES")
                .unwrap_or(placement_defaults.priority_types),
            inline_eligible_types: env_mime_set("INLINE_MIME_TYPES")
                .unwrap_or(placement_defaults.inline_eligible_types),
        };

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                local_public_base_url,
                r2_endpoint: std::env::var("R2_ENDPOINT").ok(),
                r2_bucket: std::env::var("R2_BUCKET").ok(),
                r2_access_key_id: std::env::var("R2_ACCESS_KEY_ID").ok(),
                r2_secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY").ok(),
                r2_region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
                r2_public_base_url: std::env::var("R2_PUBLIC_BASE_URL").ok(),
                signed_url_expiry_secs: env_u64("SIGNED_URL_EXPIRY_SECS", 3600),
                operation_timeout_secs: env_u64("OBJECT_STORE_TIMEOUT_SECS", 30),
            },
            placement,
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    /// Missing backend credentials are a startup failure, never a runtime one.
    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::R2) {
            for (var, value) in [
                ("R2_ENDPOINT", &self.storage.r2_endpoint),
                ("R2_BUCKET", &self.storage.r2_bucket),
                ("R2_ACCESS_KEY_ID", &self.storage.r2_access_key_id),
                ("R2_SECRET_ACCESS_KEY", &self.storage.r2_secret_access_key),
            ] {
                if value.as_deref().map(str::is_empty).unwrap_or(true) {
                    return Err(ConfigError::ValidationError(format!(
                        "{var} is required when STORAGE_BACKEND=r2"
                    )));
                }
            }
        }

        if self.storage.signed_url_expiry_secs == 0 {
            return Err(ConfigError::ValidationError(
                "SIGNED_URL_EXPIRY_SECS must be greater than 0".to_string(),
            ));
        }

        if self.storage.operation_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "OBJECT_STORE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.placement.inline_max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "INLINE_MAX_BYTES must be greater than 0".to_string(),
            ));
        }

        if self.placement.object_store_min_bytes > self.placement.inline_max_bytes {
            tracing::warn!(
                "OBJECT_STORE_MIN_BYTES ({}) exceeds INLINE_MAX_BYTES ({}); the \
                 large-file floor will shadow part of the inline window.",
                self.placement.object_store_min_bytes,
                self.placement.inline_max_bytes
            );
        }

        Ok(())
    }
}
