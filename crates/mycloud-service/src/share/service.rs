//! Sharing files with other users and by public token.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;
use mycloud_core::traits::storage::ByteStream;
use mycloud_database::repositories::{FileRepository, ShareRepository, UserRepository};
use mycloud_entity::file::File;
use mycloud_entity::share::{SharePermission, SharedFile};
use mycloud_storage::BlobStore;

use crate::context::RequestContext;
use crate::share::token::generate_token;

/// A file's metadata together with its content stream.
pub struct OpenedFile {
    /// File metadata.
    pub file: File,
    /// File content.
    pub stream: ByteStream,
}

impl std::fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile").field("file", &self.file).finish()
    }
}

/// Grants and resolves access to files the caller does not own.
#[derive(Debug, Clone)]
pub struct ShareService {
    /// File repository.
    file_repo: Arc<FileRepository>,
    /// Share link repository.
    share_repo: Arc<ShareRepository>,
    /// User repository.
    user_repo: Arc<UserRepository>,
    /// Backing byte store.
    blobs: Arc<BlobStore>,
}

impl ShareService {
    /// Creates a new share service.
    pub fn new(
        file_repo: Arc<FileRepository>,
        share_repo: Arc<ShareRepository>,
        user_repo: Arc<UserRepository>,
        blobs: Arc<BlobStore>,
    ) -> Self {
        Self {
            file_repo,
            share_repo,
            user_repo,
            blobs,
        }
    }

    async fn owned(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.file_repo
            .find_owned(ctx.user_id, file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Shares a file with another user, replacing any earlier permission.
    pub async fn share_with_user(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_user_id: Uuid,
        permission: SharePermission,
    ) -> AppResult<SharedFile> {
        if target_user_id == ctx.user_id {
            return Err(AppError::validation("Cannot share a file with yourself"));
        }
        let file = self.owned(ctx, file_id).await?;
        self.user_repo
            .find_by_id(target_user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {target_user_id} not found")))?;

        let link = self
            .share_repo
            .upsert(file.id, target_user_id, permission)
            .await?;

        info!(
            user_id = %ctx.user_id,
            file_id = %file.id,
            shared_with = %target_user_id,
            permission = ?permission,
            "File shared"
        );
        Ok(link)
    }

    /// Removes a per-user share.
    pub async fn unshare(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_user_id: Uuid,
    ) -> AppResult<bool> {
        let file = self.owned(ctx, file_id).await?;
        let removed = self.share_repo.delete(file.id, target_user_id).await?;
        if removed {
            info!(user_id = %ctx.user_id, file_id = %file.id, shared_with = %target_user_id, "Share removed");
        }
        Ok(removed)
    }

    /// Makes a file public under a fresh token and returns the token.
    pub async fn share_public(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<String> {
        self.owned(ctx, file_id).await?;
        let token = generate_token();
        self.file_repo
            .set_public(ctx.user_id, file_id, Some(&token))
            .await?;

        info!(user_id = %ctx.user_id, file_id = %file_id, "File made public");
        Ok(token)
    }

    /// Withdraws public access and invalidates the token.
    pub async fn revoke_public(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.file_repo.set_public(ctx.user_id, file_id, None).await?;
        info!(user_id = %ctx.user_id, file_id = %file_id, "Public access revoked");
        Ok(file)
    }

    /// Resolves a public token without any ownership check.
    pub async fn find_public(&self, token: &str) -> AppResult<File> {
        self.file_repo
            .find_public(token)
            .await?
            .ok_or_else(|| AppError::not_found("File not found or not shared publicly"))
    }

    /// Opens a public file by token.
    pub async fn open_public(&self, token: &str) -> AppResult<OpenedFile> {
        let file = self.find_public(token).await?;
        let stream = self.blobs.open(&file.stored_path).await?;
        Ok(OpenedFile { file, stream })
    }

    /// Files other users have shared with the caller.
    pub async fn shared_with_me(&self, ctx: &RequestContext) -> AppResult<Vec<File>> {
        self.share_repo.find_files_shared_with(ctx.user_id).await
    }

    /// A file the caller owns or that has been shared with them.
    pub async fn get_accessible(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let not_found = || AppError::not_found(format!("File {file_id} not found"));
        let file = self.file_repo.find_by_id(file_id).await?.ok_or_else(not_found)?;
        if file.user_id == ctx.user_id {
            return Ok(file);
        }
        if file.is_trashed {
            return Err(not_found());
        }
        match self.share_repo.find(file_id, ctx.user_id).await? {
            Some(_) => Ok(file),
            None => Err(not_found()),
        }
    }

    /// Opens an accessible file for reading.
    pub async fn open(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<OpenedFile> {
        let file = self.get_accessible(ctx, file_id).await?;
        let stream = self.blobs.open(&file.stored_path).await?;
        Ok(OpenedFile { file, stream })
    }
}
