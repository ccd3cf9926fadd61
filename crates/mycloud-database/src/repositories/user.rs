//! User repository implementation, including the storage usage counter.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;
use mycloud_entity::storage::StorageQuota;
use mycloud_entity::user::{CreateUser, User};

use crate::is_unique_violation;

/// Outcome of an unconditional usage adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageAdjustment {
    /// Usage after the adjustment.
    pub storage_used: i64,
    /// Whether the adjustment would have gone below zero and was clamped.
    pub clamped: bool,
}

/// Repository for users and their storage counters.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by primary key.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user by id", e))
    }

    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find user by username", e)
            })
    }

    /// List all users ordered by username.
    pub async fn find_all(&self) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY LOWER(username) ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list users", e))
    }

    /// Create a new user with zero usage.
    pub async fn create(&self, data: &CreateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, is_admin, storage_quota, storage_used) \
             VALUES ($1, $2, $3, $4, $5, 0) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.username)
        .bind(&data.email)
        .bind(data.is_admin)
        .bind(data.storage_quota)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "users_username_key") {
                AppError::validation(format!("Username '{}' is already taken", data.username))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create user", e)
            }
        })
    }

    /// Read the `(quota, used)` pair for a user.
    pub async fn find_quota(&self, user_id: Uuid) -> AppResult<Option<StorageQuota>> {
        Self::find_quota_with(&self.pool, user_id).await
    }

    /// Read the `(quota, used)` pair for a user on the given executor.
    pub async fn find_quota_with<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> AppResult<Option<StorageQuota>>
    where
        E: PgExecutor<'e>,
    {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT storage_quota, storage_used FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(executor)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to read storage quota", e)
                })?;
        Ok(row.map(|(quota, used)| StorageQuota::new(quota, used)))
    }

    /// Apply `delta` to the usage counter, clamping at zero.
    ///
    /// Returns `None` if the user does not exist.
    pub async fn adjust_usage_with<'e, E>(
        executor: E,
        user_id: Uuid,
        delta: i64,
    ) -> AppResult<Option<UsageAdjustment>>
    where
        E: PgExecutor<'e>,
    {
        let row: Option<(i64, bool)> = sqlx::query_as(
            "WITH prev AS (SELECT storage_used FROM users WHERE id = $1 FOR UPDATE) \
             UPDATE users u SET storage_used = GREATEST(0, prev.storage_used + $2), \
             updated_at = NOW() \
             FROM prev WHERE u.id = $1 \
             RETURNING u.storage_used, (prev.storage_used + $2) < 0",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to adjust storage usage", e))?;

        Ok(row.map(|(storage_used, clamped)| UsageAdjustment {
            storage_used,
            clamped,
        }))
    }

    /// Apply `delta` only if the result stays within `[0, storage_quota]`.
    ///
    /// Returns the new usage, or `None` when the condition did not hold
    /// (or the user does not exist).
    pub async fn try_adjust_usage_with<'e, E>(
        executor: E,
        user_id: Uuid,
        delta: i64,
    ) -> AppResult<Option<i64>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "UPDATE users SET storage_used = storage_used + $2, updated_at = NOW() \
             WHERE id = $1 AND storage_used + $2 <= storage_quota AND storage_used + $2 >= 0 \
             RETURNING storage_used",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reserve storage", e))
    }

    /// Borrow the pool backing this repository.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Delete a user. Folders, files and share links cascade.
    pub async fn delete(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete user", e))?;
        Ok(result.rows_affected() > 0)
    }
}
