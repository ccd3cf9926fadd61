//! # mycloud-core
//!
//! Core crate for MyCloud. Contains configuration schemas, the unified
//! error system, the backing byte-store trait, and pagination types.
//!
//! This crate has **no** internal dependencies on other MyCloud crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
