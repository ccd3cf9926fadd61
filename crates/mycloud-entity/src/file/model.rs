//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: Uuid,
    /// Internal stored file name, unique per storage location.
    pub name: String,
    /// User-facing file name.
    pub original_name: String,
    /// Location of the bytes inside the backing store.
    #[serde(skip_serializing)]
    pub stored_path: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// MIME type of the file.
    pub mime_type: Option<String>,
    /// The containing folder (null for the user's root).
    pub folder_id: Option<Uuid>,
    /// The file owner.
    pub user_id: Uuid,
    /// Whether the file can be fetched anonymously by share token.
    pub is_public: bool,
    /// Whether the owner marked the file as a favorite.
    pub is_favorite: bool,
    /// Whether the file is in the trash.
    pub is_trashed: bool,
    /// When the file was moved to the trash.
    pub trashed_at: Option<DateTime<Utc>>,
    /// Opaque public share token.
    #[serde(skip_serializing)]
    pub share_token: Option<String>,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Get the extension of the user-facing name (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.original_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// Internal stored file name.
    pub name: String,
    /// User-facing file name.
    pub original_name: String,
    /// Location inside the backing store.
    pub stored_path: String,
    /// Measured size in bytes.
    pub size_bytes: i64,
    /// MIME type.
    pub mime_type: Option<String>,
    /// The containing folder.
    pub folder_id: Option<Uuid>,
    /// The file owner.
    pub user_id: Uuid,
}
