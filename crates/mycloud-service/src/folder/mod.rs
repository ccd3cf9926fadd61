//! Folder hierarchy: path arithmetic, tree reconstruction and the folder store.

pub mod path;
pub mod service;
pub mod tree;

pub use service::{FolderDeletion, FolderService};
pub use tree::build_forest;
