//! # mycloud-service
//!
//! Storage engine for MyCloud. Each service orchestrates repositories,
//! the quota ledger and the blob store to implement one area of the
//! personal storage model: folders, files, shares and archive extraction.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod archive;
pub mod context;
pub mod file;
pub mod folder;
pub mod quota;
pub mod share;

mod tx;

pub use archive::{ExtractionEngine, ExtractionResult, InFlightSet};
pub use context::RequestContext;
pub use file::{FileService, StorageStats};
pub use folder::{FolderDeletion, FolderService};
pub use quota::QuotaLedger;
pub use share::{OpenedFile, ShareService};
