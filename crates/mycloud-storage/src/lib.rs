//! # mycloud-storage
//!
//! The backing byte store. [`providers::LocalStorageProvider`] implements
//! [`mycloud_core::traits::storage::StorageProvider`] on the local
//! filesystem; [`BlobStore`] lays files out per user under generated
//! names that never derive from the user-facing file name.

pub mod blob;
pub mod providers;

pub use blob::{BlobStore, StoredBlob};
pub use providers::LocalStorageProvider;
