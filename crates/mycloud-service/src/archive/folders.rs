//! Per-run folder materialization for archive extraction.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use mycloud_core::result::AppResult;
use mycloud_database::repositories::FolderRepository;
use mycloud_entity::folder::CreateFolder;

use crate::folder::path::child_path;

/// Path to folder id cache that lives for one extraction run.
///
/// Seeded with the destination folder. Each directory segment is looked up
/// once; an existing folder at the same path is reused and pointed at the
/// parent just resolved.
#[derive(Debug)]
pub struct FolderCache {
    user_id: Uuid,
    root_path: String,
    root_id: Uuid,
    ids: HashMap<String, Uuid>,
    created: Vec<Uuid>,
}

impl FolderCache {
    /// Start a cache rooted at the destination folder.
    pub fn new(user_id: Uuid, root_id: Uuid, root_path: impl Into<String>) -> Self {
        let root_path = root_path.into();
        let mut ids = HashMap::new();
        ids.insert(root_path.clone(), root_id);
        Self {
            user_id,
            root_path,
            root_id,
            ids,
            created: Vec::new(),
        }
    }

    /// Folders inserted by this run, excluding the destination.
    pub fn created(&self) -> &[Uuid] {
        &self.created
    }

    /// The id of the folder for `segments` below the root, creating any
    /// missing folders along the way.
    pub async fn resolve(&mut self, conn: &mut PgConnection, segments: &[String]) -> AppResult<Uuid> {
        let mut parent_id = self.root_id;
        let mut parent_path = self.root_path.clone();

        for segment in segments {
            let path = child_path(Some(&parent_path), segment);
            let id = match self.ids.get(&path) {
                Some(&id) => id,
                None => {
                    let id = self.materialize(conn, segment, parent_id, &path).await?;
                    self.ids.insert(path.clone(), id);
                    id
                }
            };
            parent_id = id;
            parent_path = path;
        }

        Ok(parent_id)
    }

    async fn materialize(
        &mut self,
        conn: &mut PgConnection,
        name: &str,
        parent_id: Uuid,
        path: &str,
    ) -> AppResult<Uuid> {
        if let Some(existing) = FolderRepository::find_by_path_with(&mut *conn, self.user_id, path).await? {
            if existing.parent_id != Some(parent_id) {
                debug!(folder_id = %existing.id, path = %path, "Reparenting existing folder");
            }
            FolderRepository::set_parent_with(&mut *conn, existing.id, Some(parent_id)).await?;
            return Ok(existing.id);
        }

        let folder = FolderRepository::create_with(
            &mut *conn,
            &CreateFolder {
                name: name.to_string(),
                parent_id: Some(parent_id),
                user_id: self.user_id,
                path: path.to_string(),
            },
        )
        .await?;
        self.created.push(folder.id);
        Ok(folder.id)
    }
}
