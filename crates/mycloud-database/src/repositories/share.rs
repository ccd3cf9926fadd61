//! Per-user share link repository.

use sqlx::PgPool;
use uuid::Uuid;

use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;
use mycloud_entity::file::File;
use mycloud_entity::share::{SharePermission, SharedFile};

/// Repository for `shared_files` links.
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the link granting `user_id` access to `file_id`.
    pub async fn find(&self, file_id: Uuid, user_id: Uuid) -> AppResult<Option<SharedFile>> {
        sqlx::query_as::<_, SharedFile>(
            "SELECT * FROM shared_files WHERE file_id = $1 AND shared_with_user_id = $2",
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find share", e))
    }

    /// Create a link, or update its permission if one already exists.
    pub async fn upsert(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        permission: SharePermission,
    ) -> AppResult<SharedFile> {
        sqlx::query_as::<_, SharedFile>(
            "INSERT INTO shared_files (id, file_id, shared_with_user_id, permission) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (file_id, shared_with_user_id) \
             DO UPDATE SET permission = EXCLUDED.permission RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(file_id)
        .bind(user_id)
        .bind(permission)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to share file", e))
    }

    /// Non-trashed files shared with a user, newest link first.
    pub async fn find_files_shared_with(&self, user_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT f.* FROM files f JOIN shared_files s ON s.file_id = f.id \
             WHERE s.shared_with_user_id = $1 AND NOT f.is_trashed \
             ORDER BY s.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list shared files", e))
    }

    /// Remove a link.
    pub async fn delete(&self, file_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM shared_files WHERE file_id = $1 AND shared_with_user_id = $2")
                .bind(file_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to unshare", e))?;
        Ok(result.rows_affected() > 0)
    }
}
