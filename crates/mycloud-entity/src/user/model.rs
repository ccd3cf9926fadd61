//! User entity model.
//!
//! Only the storage-accounting side of a user lives here; credentials and
//! sessions belong to the identity service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::storage::StorageQuota;

/// A registered user and their storage ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Whether the user is an administrator.
    pub is_admin: bool,
    /// Storage ceiling in bytes, set by an administrator.
    pub storage_quota: i64,
    /// Running total of bytes consumed.
    pub storage_used: i64,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Snapshot of this user's quota position.
    pub fn quota(&self) -> StorageQuota {
        StorageQuota::new(self.storage_quota, self.storage_used)
    }
}

/// Data required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Desired username.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Whether the user is an administrator.
    pub is_admin: bool,
    /// Storage ceiling in bytes.
    pub storage_quota: i64,
}
