//! Per-user share link model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Access granted by a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_permission", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    /// The recipient may view and download.
    Read,
    /// The recipient may also modify.
    Write,
}

impl std::str::FromStr for SharePermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(format!("Unknown share permission '{other}'")),
        }
    }
}

/// A file shared with another user. Never implies ownership.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SharedFile {
    /// Unique link identifier.
    pub id: Uuid,
    /// The shared file.
    pub file_id: Uuid,
    /// The recipient.
    pub shared_with_user_id: Uuid,
    /// Granted permission.
    pub permission: SharePermission,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}
