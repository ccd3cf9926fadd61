//! Single-flight registry for archive extraction.

use std::sync::Arc;

use dashmap::DashSet;
use uuid::Uuid;

use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;

/// Set of archive file ids currently being extracted.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    inner: Arc<DashSet<Uuid>>,
}

impl InFlightSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file_id`, or fail with `ExtractionInProgress` if it is already present.
    ///
    /// The entry is removed when the returned guard is dropped, on every exit path.
    pub fn try_acquire(&self, file_id: Uuid) -> AppResult<InFlightGuard> {
        if !self.inner.insert(file_id) {
            return Err(AppError::extraction_in_progress(format!(
                "Archive {file_id} is already being extracted"
            )));
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.inner),
            file_id,
        })
    }

    /// Whether `file_id` is currently registered.
    pub fn contains(&self, file_id: Uuid) -> bool {
        self.inner.contains(&file_id)
    }

    /// Number of extractions in flight.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Holds one entry of an [`InFlightSet`] until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<DashSet<Uuid>>,
    file_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.file_id);
    }
}
