//! Folder tree structures for hierarchical display.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Folder;

/// A node in a folder tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderNode {
    /// Folder ID.
    pub id: Uuid,
    /// Folder name.
    pub name: String,
    /// Parent folder ID.
    pub parent_id: Option<Uuid>,
    /// Full path.
    pub path: String,
    /// Child folder nodes, ordered by path.
    pub children: Vec<FolderNode>,
}

impl From<Folder> for FolderNode {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            path: folder.path,
            children: Vec::new(),
        }
    }
}

impl FolderNode {
    /// Number of folders in this subtree, including this node.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(FolderNode::count).sum::<usize>()
    }
}
