//! Backing byte store configuration.

use serde::{Deserialize, Serialize};

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded bytes (one sub-directory per user).
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Maximum single upload size in bytes (default 500 MB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Quota assigned to newly created users (default 10 GB).
    #[serde(default = "default_quota")]
    pub default_quota_bytes: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            max_upload_size_bytes: default_max_upload(),
            default_quota_bytes: default_quota(),
        }
    }
}

fn default_root_path() -> String {
    "./data/uploads".to_string()
}

fn default_max_upload() -> u64 {
    524_288_000 // 500 MB
}

fn default_quota() -> i64 {
    10_737_418_240 // 10 GB
}
