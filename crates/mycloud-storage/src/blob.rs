//! Per-user blob layout over a [`StorageProvider`].
//!
//! Every blob lives at `{user_id}/{stored_name}` where the stored name is
//! a fresh UUIDv7 plus the lowercased extension of the display name.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use mycloud_core::result::AppResult;
use mycloud_core::traits::storage::{ByteStream, StorageProvider};

/// Longest extension carried over into a stored name.
const MAX_EXTENSION_LEN: usize = 16;

/// A blob that has been written to the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Generated stored name (unique, not derived from the display name).
    pub name: String,
    /// Provider-relative location.
    pub path: String,
    /// Measured size in bytes.
    pub size_bytes: i64,
}

/// Stores and removes file bytes for users.
#[derive(Debug, Clone)]
pub struct BlobStore {
    provider: Arc<dyn StorageProvider>,
}

impl BlobStore {
    /// Wrap a storage provider.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Generate a unique stored name keeping a safe extension from `display_name`.
    pub fn stored_name(display_name: &str) -> String {
        let id = Uuid::now_v7().simple().to_string();
        match safe_extension(display_name) {
            Some(ext) => format!("{id}.{ext}"),
            None => id,
        }
    }

    /// Provider-relative path of a stored name for a user.
    pub fn stored_path(user_id: Uuid, stored_name: &str) -> String {
        format!("{user_id}/{stored_name}")
    }

    /// Write `data` under a new stored name for `user_id`.
    pub async fn put(&self, user_id: Uuid, display_name: &str, data: Bytes) -> AppResult<StoredBlob> {
        let name = Self::stored_name(display_name);
        let path = Self::stored_path(user_id, &name);
        let written = self.provider.write(&path, data).await?;
        debug!(user_id = %user_id, path = %path, size = written, "Stored blob");
        Ok(StoredBlob {
            name,
            path,
            size_bytes: written as i64,
        })
    }

    /// Duplicate an existing blob under a new stored name.
    pub async fn duplicate(
        &self,
        user_id: Uuid,
        source_path: &str,
        display_name: &str,
    ) -> AppResult<StoredBlob> {
        let name = Self::stored_name(display_name);
        let path = Self::stored_path(user_id, &name);
        let copied = self.provider.copy(source_path, &path).await?;
        debug!(user_id = %user_id, from = %source_path, to = %path, "Duplicated blob");
        Ok(StoredBlob {
            name,
            path,
            size_bytes: copied as i64,
        })
    }

    /// Open a blob as a byte stream.
    pub async fn open(&self, path: &str) -> AppResult<ByteStream> {
        self.provider.read(path).await
    }

    /// Read a whole blob into memory.
    pub async fn read(&self, path: &str) -> AppResult<Bytes> {
        self.provider.read_bytes(path).await
    }

    /// Whether a blob exists.
    pub async fn exists(&self, path: &str) -> AppResult<bool> {
        self.provider.exists(path).await
    }

    /// Remove a blob. Missing blobs are not an error.
    pub async fn remove(&self, path: &str) -> AppResult<()> {
        self.provider.delete(path).await
    }

    /// Remove blobs, logging failures instead of returning them.
    ///
    /// Returns the number of blobs that could not be removed.
    pub async fn remove_all_quietly<I, S>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut failed = 0;
        for path in paths {
            let path = path.as_ref();
            if let Err(e) = self.provider.delete(path).await {
                warn!(path = %path, error = %e, "Failed to remove blob");
                failed += 1;
            }
        }
        failed
    }
}

/// The lowercased extension of `name` if it is short and alphanumeric.
fn safe_extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = base.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
