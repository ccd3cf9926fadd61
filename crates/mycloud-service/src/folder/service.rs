//! Folder CRUD, rename and move with materialized path cascades.

use std::sync::Arc;

use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;
use mycloud_database::repositories::{FileRepository, FolderRepository};
use mycloud_entity::folder::{CreateFolder, Folder, FolderNode};
use mycloud_storage::BlobStore;

use crate::context::RequestContext;
use crate::folder::path::{child_path, is_descendant_path, parent_path, rewrite_prefix, validate_name};
use crate::folder::tree::build_forest;
use crate::quota::QuotaLedger;
use crate::tx;

/// Summary of a folder deletion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FolderDeletion {
    /// The deleted folder.
    pub folder_id: Uuid,
    /// Folders removed, including the folder itself.
    pub folders_removed: u64,
    /// Files removed from the subtree (trashed or not).
    pub files_removed: u64,
    /// Bytes released from the owner's quota.
    pub bytes_released: i64,
}

/// Manages the folder hierarchy.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Folder repository.
    folder_repo: Arc<FolderRepository>,
    /// Byte store, for removing file bytes after a folder delete.
    blobs: Arc<BlobStore>,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(folder_repo: Arc<FolderRepository>, blobs: Arc<BlobStore>) -> Self {
        Self { folder_repo, blobs }
    }

    fn pool(&self) -> &PgPool {
        self.folder_repo.pool()
    }

    /// Gets a folder the caller owns.
    pub async fn get(&self, ctx: &RequestContext, folder_id: Uuid) -> AppResult<Folder> {
        self.folder_repo
            .find_owned(ctx.user_id, folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))
    }

    /// Creates a folder under `parent_id` (or at the root).
    pub async fn create(
        &self,
        ctx: &RequestContext,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        let name = validate_name(name)?;

        let parent = match parent_id {
            Some(id) => Some(
                self.folder_repo
                    .find_owned(ctx.user_id, id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Parent folder {id} not found")))?,
            ),
            None => None,
        };

        let path = child_path(parent.as_ref().map(|p| p.path.as_str()), name);
        let folder = self
            .folder_repo
            .create(&CreateFolder {
                name: name.to_string(),
                parent_id,
                user_id: ctx.user_id,
                path,
            })
            .await?;

        info!(
            user_id = %ctx.user_id,
            folder_id = %folder.id,
            path = %folder.path,
            "Folder created"
        );
        Ok(folder)
    }

    /// Lists the direct children of a folder (or the root), ordered by name.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>> {
        if let Some(id) = parent_id {
            self.get(ctx, id).await?;
        }
        self.folder_repo.find_children(ctx.user_id, parent_id).await
    }

    /// Builds the caller's whole folder forest.
    pub async fn tree(&self, ctx: &RequestContext) -> AppResult<Vec<FolderNode>> {
        let folders = self.folder_repo.find_all_for_user(ctx.user_id).await?;
        Ok(build_forest(folders))
    }

    /// Renames a folder and rewrites the paths of its whole subtree.
    pub async fn rename(
        &self,
        ctx: &RequestContext,
        folder_id: Uuid,
        new_name: &str,
    ) -> AppResult<Folder> {
        let new_name = validate_name(new_name)?;
        let mut tx = tx::begin(self.pool()).await?;

        let folder = find_owned(&mut tx, ctx.user_id, folder_id).await?;
        let new_path = child_path(parent_path(&folder.path), new_name);
        if new_path == folder.path {
            return Ok(folder);
        }

        let parent_id = folder.parent_id;
        let updated = relocate(&mut tx, ctx.user_id, folder, new_name, parent_id, &new_path).await?;
        tx::commit(tx).await?;

        info!(
            user_id = %ctx.user_id,
            folder_id = %updated.id,
            path = %updated.path,
            "Folder renamed"
        );
        Ok(updated)
    }

    /// Moves a folder under `new_parent_id` (or to the root).
    ///
    /// Fails with `CycleDetected` if the target is the folder itself or
    /// any of its descendants.
    pub async fn move_to(
        &self,
        ctx: &RequestContext,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        if new_parent_id == Some(folder_id) {
            return Err(AppError::cycle_detected("A folder cannot be moved into itself"));
        }

        let mut tx = tx::begin(self.pool()).await?;
        let folder = find_owned(&mut tx, ctx.user_id, folder_id).await?;

        let new_parent_path = match new_parent_id {
            Some(parent_id) => {
                let parent = FolderRepository::find_owned_with(&mut *tx, ctx.user_id, parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found(format!("Target folder {parent_id} not found"))
                    })?;
                if is_descendant_path(&folder.path, &parent.path) {
                    return Err(AppError::cycle_detected(format!(
                        "Cannot move '{}' into its own subtree '{}'",
                        folder.path, parent.path
                    )));
                }
                Some(parent.path)
            }
            None => None,
        };

        if folder.parent_id == new_parent_id {
            return Ok(folder);
        }

        let new_path = child_path(new_parent_path.as_deref(), &folder.name);
        let name = folder.name.clone();
        let updated = relocate(&mut tx, ctx.user_id, folder, &name, new_parent_id, &new_path).await?;
        tx::commit(tx).await?;

        info!(
            user_id = %ctx.user_id,
            folder_id = %updated.id,
            parent_id = ?new_parent_id,
            path = %updated.path,
            "Folder moved"
        );
        Ok(updated)
    }

    /// Deletes a folder, its descendants and every file beneath it.
    ///
    /// The rows and the quota release commit together; file bytes are
    /// removed afterwards on a best-effort basis.
    pub async fn delete(&self, ctx: &RequestContext, folder_id: Uuid) -> AppResult<FolderDeletion> {
        let mut tx = tx::begin(self.pool()).await?;
        let folder = find_owned(&mut tx, ctx.user_id, folder_id).await?;

        let folders =
            FolderRepository::find_subtree_for_update(&mut *tx, ctx.user_id, &folder.path).await?;
        let files = FileRepository::find_in_subtree_with(&mut *tx, ctx.user_id, &folder.path).await?;
        let bytes_released: i64 = files.iter().map(|f| f.size_bytes).sum();

        FolderRepository::delete_with(&mut *tx, ctx.user_id, folder_id).await?;
        if bytes_released > 0 {
            QuotaLedger::commit_with(&mut *tx, ctx.user_id, -bytes_released).await?;
        }
        tx::commit(tx).await?;

        let failed = self
            .blobs
            .remove_all_quietly(files.iter().map(|f| f.stored_path.as_str()))
            .await;
        if failed > 0 {
            warn!(folder_id = %folder_id, failed, "Some file bytes were left behind");
        }

        info!(
            user_id = %ctx.user_id,
            folder_id = %folder_id,
            path = %folder.path,
            folders = folders.len(),
            files = files.len(),
            bytes = bytes_released,
            "Folder deleted"
        );

        Ok(FolderDeletion {
            folder_id,
            folders_removed: folders.len() as u64,
            files_removed: files.len() as u64,
            bytes_released,
        })
    }
}

async fn find_owned(conn: &mut PgConnection, user_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
    FolderRepository::find_owned_with(conn, user_id, folder_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))
}

/// Give `folder` a new name, parent and path, then rebase every descendant.
///
/// The subtree is locked and read once before any row is written; a
/// concurrent structural change to the same subtree waits on the lock.
async fn relocate(
    conn: &mut PgConnection,
    user_id: Uuid,
    folder: Folder,
    new_name: &str,
    new_parent_id: Option<Uuid>,
    new_path: &str,
) -> AppResult<Folder> {
    let old_path = folder.path;
    let subtree = FolderRepository::find_subtree_for_update(&mut *conn, user_id, &old_path).await?;

    let updated = FolderRepository::update_location_with(
        &mut *conn,
        folder.id,
        new_name,
        new_parent_id,
        new_path,
    )
    .await?;

    for descendant in subtree.iter().filter(|f| f.id != folder.id) {
        match rewrite_prefix(&old_path, new_path, &descendant.path) {
            Some(path) => FolderRepository::update_path_with(&mut *conn, descendant.id, &path).await?,
            None => warn!(
                folder_id = %descendant.id,
                path = %descendant.path,
                prefix = %old_path,
                "Subtree row outside prefix left unchanged"
            ),
        }
    }

    Ok(updated)
}
