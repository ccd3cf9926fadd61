//! Core type definitions used across the MyCloud workspace.

pub mod pagination;

pub use pagination::{PageRequest, PageResponse};
