//! # mycloud-database
//!
//! PostgreSQL connection management and repositories for users, folders,
//! files and share links.
//!
//! Multi-row mutations take an executor so callers can run them inside a
//! single `sqlx::Transaction`.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;

/// Postgres SQLSTATE for `unique_violation`.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// Whether `err` is a unique violation on the named constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
