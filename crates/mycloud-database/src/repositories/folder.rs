//! Folder repository implementation.
//!
//! Subtree queries match `path = $p` or a `$p || '/'` prefix so that
//! sibling folders sharing a name prefix (`/Photos` vs `/Photos2`) are
//! never included.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;
use mycloud_entity::folder::{CreateFolder, Folder};

use crate::is_unique_violation;

/// Unique constraint on `(user_id, path)`.
const PATH_CONSTRAINT: &str = "folders_user_id_path_key";

fn map_write_error(e: sqlx::Error, path: &str, action: &'static str) -> AppError {
    if is_unique_violation(&e, PATH_CONSTRAINT) {
        AppError::duplicate_path(format!("Folder path '{path}' already exists"))
    } else {
        AppError::with_source(ErrorKind::Database, action, e)
    }
}

/// Repository for folder CRUD and tree queries.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: PgPool,
}

impl FolderRepository {
    /// Create a new folder repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Borrow the pool backing this repository.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a folder by ID, scoped to its owner.
    pub async fn find_owned(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Folder>> {
        Self::find_owned_with(&self.pool, user_id, id).await
    }

    /// Find a folder by ID, scoped to its owner, on the given executor.
    pub async fn find_owned_with<'e, E>(
        executor: E,
        user_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Folder>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    /// Find a folder by its materialized path.
    pub async fn find_by_path(&self, user_id: Uuid, path: &str) -> AppResult<Option<Folder>> {
        Self::find_by_path_with(&self.pool, user_id, path).await
    }

    /// Find a folder by its materialized path on the given executor.
    pub async fn find_by_path_with<'e, E>(
        executor: E,
        user_id: Uuid,
        path: &str,
    ) -> AppResult<Option<Folder>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE user_id = $1 AND path = $2")
            .bind(user_id)
            .bind(path)
            .fetch_optional(executor)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find folder by path", e)
            })
    }

    /// List direct children of a folder (or root-level folders when `parent_id` is None).
    pub async fn find_children(
        &self,
        user_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE user_id = $1 AND parent_id IS NOT DISTINCT FROM $2 \
             ORDER BY name ASC",
        )
        .bind(user_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    /// List every folder a user owns, ordered by path.
    pub async fn find_all_for_user(&self, user_id: Uuid) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE user_id = $1 ORDER BY path ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folders", e))
    }

    /// Lock and return the folder at `path` and all of its descendants, ordered by path.
    pub async fn find_subtree_for_update<'e, E>(
        executor: E,
        user_id: Uuid,
        path: &str,
    ) -> AppResult<Vec<Folder>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE user_id = $1 AND (path = $2 OR LEFT(path, LENGTH($2) + 1) = $2 || '/') \
             ORDER BY path ASC FOR UPDATE",
        )
        .bind(user_id)
        .bind(path)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load folder subtree", e))
    }

    /// Create a new folder.
    pub async fn create(&self, data: &CreateFolder) -> AppResult<Folder> {
        Self::create_with(&self.pool, data).await
    }

    /// Create a new folder on the given executor.
    pub async fn create_with<'e, E>(executor: E, data: &CreateFolder) -> AppResult<Folder>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (id, name, parent_id, user_id, path) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(data.parent_id)
        .bind(data.user_id)
        .bind(&data.path)
        .fetch_one(executor)
        .await
        .map_err(|e| map_write_error(e, &data.path, "Failed to create folder"))
    }

    /// Set a folder's name, parent and path in one statement.
    pub async fn update_location_with<'e, E>(
        executor: E,
        folder_id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
        path: &str,
    ) -> AppResult<Folder>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Folder>(
            "UPDATE folders SET name = $2, parent_id = $3, path = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(folder_id)
        .bind(name)
        .bind(parent_id)
        .bind(path)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_write_error(e, path, "Failed to update folder"))?
        .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))
    }

    /// Rewrite only the path of a descendant folder.
    pub async fn update_path_with<'e, E>(executor: E, folder_id: Uuid, path: &str) -> AppResult<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE folders SET path = $2, updated_at = NOW() WHERE id = $1")
            .bind(folder_id)
            .bind(path)
            .execute(executor)
            .await
            .map_err(|e| map_write_error(e, path, "Failed to rewrite folder path"))?;
        Ok(())
    }

    /// Point a folder at a new parent without touching its path.
    pub async fn set_parent_with<'e, E>(
        executor: E,
        folder_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE folders SET parent_id = $2, updated_at = NOW() \
             WHERE id = $1 AND parent_id IS DISTINCT FROM $2",
        )
        .bind(folder_id)
        .bind(parent_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reparent folder", e))?;
        Ok(())
    }

    /// Delete a folder (cascades to child folders and files).
    pub async fn delete_with<'e, E>(executor: E, user_id: Uuid, folder_id: Uuid) -> AppResult<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND user_id = $2")
            .bind(folder_id)
            .bind(user_id)
            .execute(executor)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete folder", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Count folders a user owns.
    pub async fn count_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count folders", e))?;
        Ok(count as u64)
    }
}
