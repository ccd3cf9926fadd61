//! File sharing: per-user links and public tokens.

pub mod service;
pub mod token;

pub use service::{OpenedFile, ShareService};
