//! Transaction helpers shared by the services.

use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};

use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;

/// Begin a transaction.
pub(crate) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))
}

/// Open a savepoint on a connection that is already inside a transaction.
pub(crate) async fn savepoint(conn: &mut PgConnection) -> AppResult<Transaction<'_, Postgres>> {
    conn.begin()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to open savepoint", e))
}

/// Commit a transaction or release a savepoint.
pub(crate) async fn commit(tx: Transaction<'_, Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e))
}

/// Roll back a transaction or a savepoint.
pub(crate) async fn rollback(tx: Transaction<'_, Postgres>) -> AppResult<()> {
    tx.rollback()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to roll back transaction", e))
}
