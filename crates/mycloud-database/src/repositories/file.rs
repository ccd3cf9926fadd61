//! File repository implementation.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;
use mycloud_core::types::pagination::{PageRequest, PageResponse};
use mycloud_entity::file::{CreateFile, File};

/// Escape `%`, `_` and `\` so a user query matches literally inside `ILIKE`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for file CRUD and query operations.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Borrow the pool backing this repository.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a file by ID regardless of owner.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    /// Find a file by ID, scoped to its owner.
    pub async fn find_owned(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    /// Find several files by ID, scoped to their owner.
    pub async fn find_many_owned(&self, user_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find files", e))
    }

    /// List non-trashed files in a folder (or the root), newest first.
    pub async fn find_in_folder(
        &self,
        user_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE user_id = $1 AND folder_id IS NOT DISTINCT FROM $2 AND NOT is_trashed \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    /// List trashed files, most recently trashed first.
    pub async fn find_trashed(&self, user_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE user_id = $1 AND is_trashed ORDER BY trashed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trash", e))
    }

    /// List non-trashed favorite files.
    pub async fn find_favorites(&self, user_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE user_id = $1 AND is_favorite AND NOT is_trashed \
             ORDER BY original_name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list favorites", e))
    }

    /// Case-insensitive substring search on the display name of non-trashed files.
    pub async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<File>> {
        let pattern = format!("%{}%", escape_like(query));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files \
             WHERE user_id = $1 AND NOT is_trashed AND original_name ILIKE $2 ESCAPE '\\'",
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count search results", e)
        })?;

        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE user_id = $1 AND NOT is_trashed AND original_name ILIKE $2 ESCAPE '\\' \
             ORDER BY original_name ASC, id ASC LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search files", e))?;

        Ok(PageResponse::new(files, page, total as u64))
    }

    /// Insert a file record on the given executor.
    pub async fn create_with<'e, E>(executor: E, data: &CreateFile) -> AppResult<File>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, File>(
            "INSERT INTO files (id, name, original_name, stored_path, size_bytes, mime_type, \
             folder_id, user_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(&data.original_name)
        .bind(&data.stored_path)
        .bind(data.size_bytes)
        .bind(&data.mime_type)
        .bind(data.folder_id)
        .bind(data.user_id)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create file", e))
    }

    /// Rename a file and update its MIME type.
    pub async fn rename(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        original_name: &str,
        mime_type: Option<&str>,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET original_name = $3, mime_type = $4, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(original_name)
        .bind(mime_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rename file", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Move a file into another folder (or the root).
    pub async fn move_to(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET folder_id = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move file", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Move every owned file in `ids` into a folder. Returns the number moved.
    pub async fn move_many(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
        folder_id: Option<Uuid>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE files SET folder_id = $3, updated_at = NOW() \
             WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .bind(folder_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move files", e))?;
        Ok(result.rows_affected())
    }

    /// Set or clear the trash flag. `trashed_at` follows the flag.
    pub async fn set_trashed(&self, user_id: Uuid, file_id: Uuid, trashed: bool) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET is_trashed = $3, \
             trashed_at = CASE WHEN $3 THEN NOW() ELSE NULL END, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(trashed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update trash flag", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Set or clear the favorite flag.
    pub async fn set_favorite(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        favorite: bool,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET is_favorite = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(favorite)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update favorite", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Set the public share token (or clear it with `None`).
    pub async fn set_public(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        token: Option<&str>,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET share_token = $3, is_public = ($3 IS NOT NULL), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update share token", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Resolve a public share token to a non-trashed public file.
    pub async fn find_public(&self, token: &str) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE share_token = $1 AND is_public AND NOT is_trashed",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to resolve share token", e))
    }

    /// Delete a file row, returning it.
    pub async fn delete_with<'e, E>(executor: E, user_id: Uuid, file_id: Uuid) -> AppResult<Option<File>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, File>("DELETE FROM files WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))
    }

    /// Every file (trashed or not) inside the folder subtree rooted at `path`.
    ///
    /// The file rows stay locked until the transaction ends, so a concurrent
    /// move cannot take one out of a subtree that is being deleted.
    pub async fn find_in_subtree_with<'e, E>(
        executor: E,
        user_id: Uuid,
        path: &str,
    ) -> AppResult<Vec<File>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, File>(
            "SELECT f.* FROM files f JOIN folders d ON d.id = f.folder_id \
             WHERE f.user_id = $1 \
             AND (d.path = $2 OR LEFT(d.path, LENGTH($2) + 1) = $2 || '/') \
             FOR UPDATE OF f",
        )
        .bind(user_id)
        .bind(path)
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list subtree files", e))
    }

    /// Count files a user owns, and their total size.
    pub async fn totals_for_user(&self, user_id: Uuid) -> AppResult<(u64, i64)> {
        let (count, bytes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0)::BIGINT FROM files WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count files", e))?;
        Ok((count as u64, bytes))
    }
}
