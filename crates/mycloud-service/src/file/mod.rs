//! File records: lifecycle service and MIME helpers.

pub mod mime;
pub mod service;

pub use service::{FileService, StorageStats};
