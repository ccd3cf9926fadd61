//! Materialized path arithmetic.
//!
//! Paths are root-relative and slash-delimited: a root-level folder named
//! `Photos` lives at `/Photos`, its child `2024` at `/Photos/2024`.

use mycloud_core::error::AppError;
use mycloud_core::result::AppResult;

/// Path of a folder named `name` under `parent_path` (or the root).
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{parent}/{name}"),
        None => format!("/{name}"),
    }
}

/// Path of the folder containing `path`, or `None` for a root-level path.
pub fn parent_path(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

/// Rebase `path` from `old_prefix` onto `new_prefix`.
///
/// Only a whole leading segment match counts: `old_prefix` must be
/// followed by `/` or the end of `path`. Returns `None` when `path` is not
/// inside `old_prefix`.
pub fn rewrite_prefix(old_prefix: &str, new_prefix: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(old_prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(format!("{new_prefix}{rest}"))
    } else {
        None
    }
}

/// True iff `path` equals `ancestor` or lies anywhere beneath it.
pub fn is_descendant_path(ancestor: &str, path: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Validate a single folder or file name.
///
/// Rejects empty (or whitespace-only) names, separators, NUL and the
/// special `.`/`..` segments. Returns the trimmed name.
pub fn validate_name(name: &str) -> AppResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if trimmed.contains(['/', '\\', '\0']) {
        return Err(AppError::validation(format!(
            "Name '{trimmed}' cannot contain path separators"
        )));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::validation(format!("Name '{trimmed}' is reserved")));
    }
    Ok(trimmed)
}
