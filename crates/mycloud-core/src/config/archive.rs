//! Archive extraction limits.

use serde::{Deserialize, Serialize};

/// Limits applied when expanding an uploaded archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Maximum number of entries an archive may contain.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Maximum total uncompressed size of one archive (default 10 GB).
    #[serde(default = "default_max_extracted")]
    pub max_extracted_bytes: u64,
    /// Entries buffered between the decompression thread and the writer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_extracted_bytes: default_max_extracted(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_extracted() -> u64 {
    10 * 1024 * 1024 * 1024
}

fn default_channel_capacity() -> usize {
    8
}
