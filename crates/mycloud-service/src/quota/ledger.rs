//! The quota ledger: checks and adjusts `storage_used` against `storage_quota`.
//!
//! Three operations with different strengths:
//!
//! * [`QuotaLedger::check_and_reserve`] reads the counter and fails early.
//!   It is advisory; two concurrent callers can both pass.
//! * [`QuotaLedger::try_commit_with`] adds a delta only if the result fits,
//!   in one conditional `UPDATE`. Ingest paths finish with it inside their
//!   transaction, so the counter never crosses the ceiling.
//! * [`QuotaLedger::commit_with`] applies any delta unconditionally,
//!   clamping at zero. Used for releases and compensation.

use std::sync::Arc;

use sqlx::PgExecutor;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;
use mycloud_database::repositories::UserRepository;
use mycloud_entity::storage::StorageQuota;

/// Gate and account for storage consumption per user.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    user_repo: Arc<UserRepository>,
}

impl QuotaLedger {
    /// Creates a new ledger.
    pub fn new(user_repo: Arc<UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Current `(quota, used)` position for a user.
    pub async fn usage(&self, user_id: Uuid) -> AppResult<StorageQuota> {
        self.user_repo
            .find_quota(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))
    }

    /// Fail with `QuotaExceeded` if `additional_bytes` would not fit right now.
    pub async fn check_and_reserve(
        &self,
        user_id: Uuid,
        additional_bytes: i64,
    ) -> AppResult<StorageQuota> {
        let quota = self.usage(user_id).await?;
        if quota.would_exceed(additional_bytes) {
            debug!(
                user_id = %user_id,
                requested = additional_bytes,
                used = quota.used_bytes,
                quota = quota.total_bytes,
                "Quota check rejected"
            );
            return Err(quota_exceeded(&quota, additional_bytes));
        }
        Ok(quota)
    }

    /// Apply `delta` unconditionally on the pool.
    pub async fn commit(&self, user_id: Uuid, delta: i64) -> AppResult<i64> {
        Self::commit_with(self.user_repo.pool(), user_id, delta).await
    }

    /// Apply `delta` unconditionally, never letting usage go below zero.
    ///
    /// A clamp means the ledger and the file rows disagree; it is logged
    /// rather than surfaced.
    pub async fn commit_with<'e, E>(executor: E, user_id: Uuid, delta: i64) -> AppResult<i64>
    where
        E: PgExecutor<'e>,
    {
        let adjustment = UserRepository::adjust_usage_with(executor, user_id, delta)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;

        if adjustment.clamped {
            warn!(
                user_id = %user_id,
                delta,
                "Storage usage would have gone negative; clamped to zero"
            );
        }
        info!(user_id = %user_id, delta, used = adjustment.storage_used, "Quota committed");
        Ok(adjustment.storage_used)
    }

    /// Add `delta` only if `used + delta <= quota`, in a single statement.
    pub async fn try_commit_with<'e, E>(executor: E, user_id: Uuid, delta: i64) -> AppResult<i64>
    where
        E: PgExecutor<'e>,
    {
        match UserRepository::try_adjust_usage_with(executor, user_id, delta).await? {
            Some(used) => {
                info!(user_id = %user_id, delta, used, "Quota committed");
                Ok(used)
            }
            None => {
                debug!(user_id = %user_id, delta, "Conditional quota commit rejected");
                Err(AppError::quota_exceeded(format!(
                    "Storage quota exceeded: {delta} more bytes do not fit"
                )))
            }
        }
    }
}

fn quota_exceeded(quota: &StorageQuota, requested: i64) -> AppError {
    AppError::quota_exceeded(format!(
        "Storage quota exceeded: {requested} bytes requested, {} of {} bytes available",
        quota.available_bytes, quota.total_bytes
    ))
}
