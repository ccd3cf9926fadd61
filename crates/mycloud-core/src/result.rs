//! Convenience result type alias for MyCloud.

use crate::error::AppError;

/// A specialized `Result` type for MyCloud operations.
pub type AppResult<T> = Result<T, AppError>;
