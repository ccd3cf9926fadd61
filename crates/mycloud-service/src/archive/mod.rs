//! Zip extraction into the folder tree.

pub mod engine;
pub mod entry;
pub mod folders;
pub mod guard;

pub use engine::{CreatedFile, ExtractionEngine, ExtractionResult};
pub use guard::{InFlightGuard, InFlightSet};
