//! File record lifecycle: upload, copy, rename, move, trash and purge.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use mycloud_core::config::StorageConfig;
use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;
use mycloud_core::types::{PageRequest, PageResponse};
use mycloud_database::repositories::{FileRepository, FolderRepository};
use mycloud_entity::file::{CreateFile, File};
use mycloud_entity::storage::StorageQuota;
use mycloud_storage::{BlobStore, StoredBlob};

use crate::context::RequestContext;
use crate::file::mime::guess_mime;
use crate::folder::path::validate_name;
use crate::quota::QuotaLedger;
use crate::tx;

/// Storage usage plus object counts for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    /// Quota position.
    pub quota: StorageQuota,
    /// Number of files (including trashed).
    pub file_count: u64,
    /// Number of folders.
    pub folder_count: u64,
}

/// Manages file metadata and the bytes behind it.
#[derive(Debug, Clone)]
pub struct FileService {
    /// File repository.
    file_repo: Arc<FileRepository>,
    /// Folder repository.
    folder_repo: Arc<FolderRepository>,
    /// Quota ledger.
    ledger: Arc<QuotaLedger>,
    /// Backing byte store.
    blobs: Arc<BlobStore>,
    /// Storage configuration.
    config: StorageConfig,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        file_repo: Arc<FileRepository>,
        folder_repo: Arc<FolderRepository>,
        ledger: Arc<QuotaLedger>,
        blobs: Arc<BlobStore>,
        config: StorageConfig,
    ) -> Self {
        Self {
            file_repo,
            folder_repo,
            ledger,
            blobs,
            config,
        }
    }

    /// Gets a file the caller owns.
    pub async fn get(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.file_repo
            .find_owned(ctx.user_id, file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Fails with `NotFound` unless `folder_id` is None or a folder the caller owns.
    async fn require_folder(&self, ctx: &RequestContext, folder_id: Option<Uuid>) -> AppResult<()> {
        if let Some(id) = folder_id {
            self.folder_repo
                .find_owned(ctx.user_id, id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        }
        Ok(())
    }

    /// Stores `data` and records it as a new file named `name`.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        name: &str,
        data: Bytes,
        folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let name = validate_name(name)?;
        if data.len() as u64 > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds the maximum upload size of {} bytes",
                self.config.max_upload_size_bytes
            )));
        }
        self.require_folder(ctx, folder_id).await?;
        self.ledger
            .check_and_reserve(ctx.user_id, data.len() as i64)
            .await?;

        let blob = self.blobs.put(ctx.user_id, name, data).await?;
        let record = new_record(ctx, &blob, name, folder_id);
        let result = self.create(ctx, &record).await;
        self.compensate(result, &blob).await
    }

    /// Persists a file row for bytes that are already stored and commits its size.
    ///
    /// The insert and the quota commit share one transaction; the commit is
    /// conditional, so this fails with `QuotaExceeded` rather than overrun.
    pub async fn create(&self, ctx: &RequestContext, data: &CreateFile) -> AppResult<File> {
        if data.user_id != ctx.user_id {
            return Err(AppError::validation("File owner must be the acting user"));
        }

        let mut tx = tx::begin(self.file_repo.pool()).await?;
        let file = FileRepository::create_with(&mut *tx, data).await?;
        QuotaLedger::try_commit_with(&mut *tx, ctx.user_id, file.size_bytes).await?;
        tx::commit(tx).await?;

        info!(
            user_id = %ctx.user_id,
            file_id = %file.id,
            name = %file.original_name,
            size = file.size_bytes,
            "File created"
        );
        Ok(file)
    }

    /// Duplicates a file (bytes and row) into `target_folder_id`.
    pub async fn copy(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let source = self.get(ctx, file_id).await?;
        self.require_folder(ctx, target_folder_id).await?;
        self.ledger
            .check_and_reserve(ctx.user_id, source.size_bytes)
            .await?;

        let display_name = copy_name(&source.original_name);
        let blob = self
            .blobs
            .duplicate(ctx.user_id, &source.stored_path, &display_name)
            .await?;

        let mut record = new_record(ctx, &blob, &display_name, target_folder_id);
        record.mime_type = source.mime_type.clone().or(record.mime_type);
        let result = self.create(ctx, &record).await;
        let copy = self.compensate(result, &blob).await?;

        info!(
            user_id = %ctx.user_id,
            source_id = %source.id,
            file_id = %copy.id,
            "File copied"
        );
        Ok(copy)
    }

    /// Renames a file; the MIME type follows the new extension.
    pub async fn rename(&self, ctx: &RequestContext, file_id: Uuid, new_name: &str) -> AppResult<File> {
        let new_name = validate_name(new_name)?;
        let mime_type = guess_mime(new_name);
        let file = self
            .file_repo
            .rename(ctx.user_id, file_id, new_name, mime_type.as_deref())
            .await?;

        info!(user_id = %ctx.user_id, file_id = %file_id, name = %new_name, "File renamed");
        Ok(file)
    }

    /// Moves a file into `folder_id` (or the root). No quota change.
    pub async fn move_to(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        self.require_folder(ctx, folder_id).await?;
        let file = self.file_repo.move_to(ctx.user_id, file_id, folder_id).await?;

        info!(user_id = %ctx.user_id, file_id = %file_id, folder_id = ?folder_id, "File moved");
        Ok(file)
    }

    /// Moves several files at once. The target is validated once up front;
    /// ids the caller does not own are ignored. Returns the number moved.
    pub async fn bulk_move(
        &self,
        ctx: &RequestContext,
        file_ids: &[Uuid],
        folder_id: Option<Uuid>,
    ) -> AppResult<u64> {
        self.require_folder(ctx, folder_id).await?;
        let moved = self
            .file_repo
            .move_many(ctx.user_id, file_ids, folder_id)
            .await?;

        info!(
            user_id = %ctx.user_id,
            requested = file_ids.len(),
            moved,
            folder_id = ?folder_id,
            "Files moved"
        );
        Ok(moved)
    }

    /// Moves a file to the trash. Its bytes stay allocated.
    pub async fn trash(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.file_repo.set_trashed(ctx.user_id, file_id, true).await?;
        info!(user_id = %ctx.user_id, file_id = %file_id, "File trashed");
        Ok(file)
    }

    /// Restores a file from the trash.
    pub async fn restore(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.file_repo.set_trashed(ctx.user_id, file_id, false).await?;
        info!(user_id = %ctx.user_id, file_id = %file_id, "File restored");
        Ok(file)
    }

    /// Marks or unmarks a file as a favorite.
    pub async fn set_favorite(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        favorite: bool,
    ) -> AppResult<File> {
        self.file_repo
            .set_favorite(ctx.user_id, file_id, favorite)
            .await
    }

    /// Permanently deletes a file (trashed or not) and releases its size.
    pub async fn purge(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let mut tx = tx::begin(self.file_repo.pool()).await?;
        let file = FileRepository::delete_with(&mut *tx, ctx.user_id, file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
        QuotaLedger::commit_with(&mut *tx, ctx.user_id, -file.size_bytes).await?;
        tx::commit(tx).await?;

        if let Err(e) = self.blobs.remove(&file.stored_path).await {
            warn!(file_id = %file.id, path = %file.stored_path, error = %e, "Failed to remove file bytes");
        }

        info!(
            user_id = %ctx.user_id,
            file_id = %file.id,
            size = file.size_bytes,
            "File purged"
        );
        Ok(file)
    }

    /// Purges every file in `file_ids`, continuing past failures.
    ///
    /// Returns how many were purged.
    pub async fn bulk_delete(&self, ctx: &RequestContext, file_ids: &[Uuid]) -> AppResult<u64> {
        let mut purged = 0;
        for &file_id in file_ids {
            match self.purge(ctx, file_id).await {
                Ok(_) => purged += 1,
                Err(e) => warn!(user_id = %ctx.user_id, file_id = %file_id, error = %e, "Purge failed"),
            }
        }
        info!(user_id = %ctx.user_id, requested = file_ids.len(), purged, "Bulk delete finished");
        Ok(purged)
    }

    /// Purges everything in the caller's trash. Returns how many were purged.
    pub async fn empty_trash(&self, ctx: &RequestContext) -> AppResult<u64> {
        let ids: Vec<Uuid> = self
            .file_repo
            .find_trashed(ctx.user_id)
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();
        self.bulk_delete(ctx, &ids).await
    }

    /// Lists non-trashed files in a folder (or the root), newest first.
    pub async fn list(&self, ctx: &RequestContext, folder_id: Option<Uuid>) -> AppResult<Vec<File>> {
        self.require_folder(ctx, folder_id).await?;
        self.file_repo.find_in_folder(ctx.user_id, folder_id).await
    }

    /// Lists the caller's trash.
    pub async fn list_trash(&self, ctx: &RequestContext) -> AppResult<Vec<File>> {
        self.file_repo.find_trashed(ctx.user_id).await
    }

    /// Lists the caller's favorites.
    pub async fn list_favorites(&self, ctx: &RequestContext) -> AppResult<Vec<File>> {
        self.file_repo.find_favorites(ctx.user_id).await
    }

    /// Searches display names of non-trashed files.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        page: PageRequest,
    ) -> AppResult<PageResponse<File>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query cannot be empty"));
        }
        self.file_repo.search(ctx.user_id, query, &page).await
    }

    /// Quota position plus file and folder counts.
    pub async fn stats(&self, ctx: &RequestContext) -> AppResult<StorageStats> {
        let quota = self.ledger.usage(ctx.user_id).await?;
        let (file_count, _) = self.file_repo.totals_for_user(ctx.user_id).await?;
        let folder_count = self.folder_repo.count_for_user(ctx.user_id).await?;
        Ok(StorageStats {
            quota,
            file_count,
            folder_count,
        })
    }

    /// Remove `blob` if `result` failed, then pass `result` through.
    async fn compensate<T>(&self, result: AppResult<T>, blob: &StoredBlob) -> AppResult<T> {
        if result.is_err() {
            if let Err(e) = self.blobs.remove(&blob.path).await {
                warn!(path = %blob.path, error = %e, "Failed to remove orphaned bytes");
            }
        }
        result
    }
}

fn new_record(
    ctx: &RequestContext,
    blob: &StoredBlob,
    display_name: &str,
    folder_id: Option<Uuid>,
) -> CreateFile {
    CreateFile {
        name: blob.name.clone(),
        original_name: display_name.to_string(),
        stored_path: blob.path.clone(),
        size_bytes: blob.size_bytes,
        mime_type: guess_mime(display_name),
        folder_id,
        user_id: ctx.user_id,
    }
}

/// Display name for a duplicate: `report.pdf` becomes `report (copy).pdf`.
pub fn copy_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{stem} (copy).{ext}")
        }
        _ => format!("{original} (copy)"),
    }
}
