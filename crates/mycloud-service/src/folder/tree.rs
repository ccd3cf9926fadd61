//! Folder forest reconstruction from a flat list of rows.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use mycloud_entity::folder::{Folder, FolderNode};

/// Build the forest of root folders with nested children.
///
/// Children keep the order of `folders` (callers pass rows ordered by
/// path). A folder whose `parent_id` is not in the list is skipped along
/// with its descendants.
pub fn build_forest(folders: Vec<Folder>) -> Vec<FolderNode> {
    let total = folders.len();
    let index: HashMap<Uuid, usize> = folders
        .iter()
        .enumerate()
        .map(|(i, folder)| (folder.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); total];
    let mut roots = Vec::new();
    for (i, folder) in folders.iter().enumerate() {
        match folder.parent_id {
            None => roots.push(i),
            Some(parent_id) => match index.get(&parent_id) {
                Some(&p) if p != i => children[p].push(i),
                _ => warn!(
                    folder_id = %folder.id,
                    parent_id = %parent_id,
                    path = %folder.path,
                    "Skipping folder with missing parent"
                ),
            },
        }
    }

    // Pre-order walk from the roots; a node's children always come after it.
    let mut order = Vec::with_capacity(total);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(children[i].iter().rev());
    }
    if order.len() < total {
        warn!(
            skipped = total - order.len(),
            "Folders unreachable from any root were left out of the tree"
        );
    }

    let mut slots: Vec<Option<FolderNode>> = folders
        .into_iter()
        .map(|folder| Some(FolderNode::from(folder)))
        .collect();

    for &i in order.iter().rev() {
        let kids: Vec<FolderNode> = children[i]
            .iter()
            .filter_map(|&c| slots[c].take())
            .collect();
        if let Some(node) = slots[i].as_mut() {
            node.children = kids;
        }
    }

    roots.iter().filter_map(|&r| slots[r].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn folder(id: u128, parent: Option<u128>, path: &str) -> Folder {
        Folder {
            id: Uuid::from_u128(id),
            name: path.rsplit('/').next().unwrap_or_default().to_string(),
            parent_id: parent.map(Uuid::from_u128),
            user_id: Uuid::from_u128(999),
            path: path.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_builds_nested_forest() {
        let rows = vec![
            folder(1, None, "/Docs"),
            folder(2, Some(1), "/Docs/Work"),
            folder(3, Some(2), "/Docs/Work/2024"),
            folder(4, Some(1), "/Docs/Zed"),
            folder(5, None, "/Photos"),
        ];

        let forest = build_forest(rows);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].path, "/Docs");
        assert_eq!(forest[0].children.len(), 2);
        assert_eq!(forest[0].children[0].name, "Work");
        assert_eq!(forest[0].children[0].children[0].path, "/Docs/Work/2024");
        assert_eq!(forest[0].children[1].name, "Zed");
        assert_eq!(forest[1].path, "/Photos");
        assert_eq!(forest.iter().map(FolderNode::count).sum::<usize>(), 5);
    }

    #[test]
    fn test_children_listed_before_parent_still_link() {
        let rows = vec![
            folder(2, Some(1), "/a/b"),
            folder(1, None, "/a"),
        ];
        let forest = build_forest(rows);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].id, Uuid::from_u128(2));
    }

    #[test]
    fn test_orphans_are_skipped() {
        let rows = vec![
            folder(1, None, "/a"),
            folder(2, Some(42), "/ghost/b"),
            folder(3, Some(2), "/ghost/b/c"),
        ];
        let forest = build_forest(rows);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].count(), 1);
    }

    #[test]
    fn test_parent_cycle_does_not_hang() {
        let rows = vec![
            folder(1, Some(2), "/x"),
            folder(2, Some(1), "/y"),
            folder(3, Some(3), "/self"),
        ];
        assert!(build_forest(rows).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(build_forest(Vec::new()).is_empty());
    }
}
