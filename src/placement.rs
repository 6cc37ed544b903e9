//! Placement policy: decides where a file's bytes live.
//!
//! Classification is a pure function of (MIME type, byte size) over a fixed
//! policy. It performs no I/O and must stay callable before any bytes are
//! transferred, so callers can pre-flight the upload path.

use serde::{Deserialize, Serialize};

use crate::config::PlacementConfig;

/// Where a file's bytes are stored. Recorded at upload time and write-once
/// thereafter; a file is never migrated between classes on the live path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    ObjectStore,
    InlineDb,
}

/// Why a file was classified the way it was. Diagnostic only -- never
/// persisted, never load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementReason {
    PriorityType,
    LargeFile,
    LightFile,
    Default,
}

/// The outcome of classifying one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub class: StorageClass,
    pub reason: PlacementReason,
}

/// Immutable classification rules, built once from configuration.
#[derive(Debug, Clone)]
pub struct PlacementPolicy {
    inline_max_bytes: u64,
    object_store_min_bytes: u64,
    priority_types: std::collections::HashSet<String>,
    inline_eligible_types: std::collections::HashSet<String>,
}

impl PlacementPolicy {
    pub fn new(config: &PlacementConfig) -> Self {
        Self {
            inline_max_bytes: config.inline_max_bytes,
            object_store_min_bytes: config.object_store_min_bytes,
            priority_types: config.priority_types.clone(),
            inline_eligible_types: config.inline_eligible_types.clone(),
        }
    }

    /// Classify a candidate file. Total over all inputs: anything not matched
    /// by an explicit rule lands in the object store, which has no inherent
    /// size or type restriction, so the fallback never loses data.
    ///
    /// Rule order matters. The priority-type check is size-independent and
    /// runs before any size rule: a 1 KB PDF still goes to the object store.
    pub fn classify(&self, mime_type: &str, byte_size: u64) -> Placement {
        let mime_type = normalize_mime(mime_type);

        if self.priority_types.contains(&mime_type) {
            return Placement {
                class: StorageClass::ObjectStore,
                reason: PlacementReason::PriorityType,
            };
        }

        if byte_size > self.object_store_min_bytes {
            return Placement {
                class: StorageClass::ObjectStore,
                reason: PlacementReason::LargeFile,
            };
        }

        if self.inline_eligible_types.contains(&mime_type) && byte_size <= self.inline_max_bytes {
            return Placement {
                class: StorageClass::InlineDb,
                reason: PlacementReason::LightFile,
            };
        }

        Placement {
            class: StorageClass::ObjectStore,
            reason: PlacementReason::Default,
        }
    }
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::new(&PlacementConfig::default())
    }
}

/// MIME types compare case-insensitively; parameters (`; charset=...`) do not
/// participate in classification.
fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
